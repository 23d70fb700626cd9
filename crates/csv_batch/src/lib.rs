pub mod error;
pub mod processor;
pub mod url;
pub mod youtube;

pub use error::{BatchError, Result};
pub use processor::BatchProcessor;
pub use url::{is_youtube_url, parse_csv_urls, sanitize_title};
pub use youtube::YoutubeDownloader;
