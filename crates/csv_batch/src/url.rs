use once_cell::sync::Lazy;
use regex::Regex;

static YOUTUBE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
	[
		r"^https://(www\.)?youtube\.com/watch\?v=[\w-]+",
		r"^https://(www\.)?youtu\.be/[\w-]+",
		r"^https://(www\.)?youtube\.com/shorts/[\w-]+",
	]
	.iter()
	.map(|p| Regex::new(p).expect("youtube url pattern"))
	.collect()
});

/// The small allow-list of YouTube URL shapes a batch accepts.
#[must_use]
pub fn is_youtube_url(url: &str) -> bool {
	YOUTUBE_PATTERNS.iter().any(|p| p.is_match(url))
}

/// Extract valid URLs from a CSV payload: one URL somewhere in each data
/// row, an optional `url` header row ignored, invalid rows discarded.
#[must_use]
pub fn parse_csv_urls(bytes: &[u8]) -> Vec<String> {
	let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(bytes);
	let mut urls = Vec::new();

	for record in reader.records().flatten() {
		if let Some(url) = record.iter().map(str::trim).find(|field| is_youtube_url(field)) {
			urls.push(url.to_string());
		}
	}
	urls
}

const MAX_TITLE_LENGTH: usize = 80;

/// Reduce a video title to something safe in a filename.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
	let mut sanitized: String = title
		.trim()
		.chars()
		.filter_map(|c| {
			if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
				Some(c)
			} else if c.is_whitespace() {
				Some('_')
			} else {
				None
			}
		})
		.collect();
	sanitized.truncate(MAX_TITLE_LENGTH);
	if sanitized.is_empty() {
		"untitled".to_string()
	} else {
		sanitized
	}
}
