//! # eziarr-sources
//!
//! Alternative places to fetch media from when the indexers come up empty:
//! direct HTTP downloads, the public archive, open directory listings and a
//! messaging platform. Everything downloaded lands under one downloads root,
//! one folder per artifact, ready to be handed to a media service for import.

pub mod archive;
pub mod downloader;
pub mod messaging;
pub mod opendir;

pub use archive::{ArchiveClient, ArchiveFile, ArchiveItem};
pub use downloader::{
    folder_name, partial_path, prepare_target, sanitize_filename, DownloadTarget, HttpDownloader,
};
pub use messaging::{
    Channel, LoginOutcome, MessageHit, MessagingClient, MessagingConnector, MessagingCredentials,
    MessagingSession, SignIn,
};
pub use opendir::{extract_video_links, parse_safe_url, OpenDirFile, OpenDirScanner};
