use std::path::PathBuf;

use thiserror::Error;

/// Run-level failures. Per-segment and per-place network failures never
/// surface here; they are absorbed and counted in [`crate::ApiStats`].
#[derive(Debug, Error)]
pub enum FinderError {
    #[error("no track or route points found; the file must contain a track or route with at least two points")]
    NoTrackPoints,

    #[error("track point {index} has invalid coordinates ({latitude}, {longitude})")]
    InvalidPoint {
        index: usize,
        latitude: f64,
        longitude: f64,
    },

    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "gpx")]
    #[error("invalid GPX in {}: {source}", .path.display())]
    Gpx {
        path: PathBuf,
        #[source]
        source: gpx::errors::GpxError,
    },

    #[error("output directory {} does not exist or is not a directory", .0.display())]
    OutputDirMissing(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[cfg(feature = "http")]
    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl FinderError {
    /// Short hint on how to fix the problem, shown under the error message.
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            FinderError::NoTrackPoints => {
                Some("Select a GPX file that contains track or route information.")
            }
            FinderError::InvalidPoint { .. } => {
                Some("Latitudes must lie in [-90, 90] and longitudes in [-180, 180].")
            }
            FinderError::Io { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => {
                    Some("Check that the file exists and the path is spelled correctly.")
                }
                std::io::ErrorKind::PermissionDenied => Some(
                    "Check read access to the GPX file and write access to the output directory.",
                ),
                _ => None,
            },
            #[cfg(feature = "gpx")]
            FinderError::Gpx { .. } => Some("Please check your GPX file format."),
            FinderError::OutputDirMissing(_) => Some("Create the directory or choose another one."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_guidance_depends_on_kind() {
        let not_found = FinderError::Io {
            path: PathBuf::from("missing.gpx"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(not_found.to_string().contains("missing.gpx"));
        assert!(not_found.guidance().unwrap().contains("exists"));

        let denied = FinderError::Io {
            path: PathBuf::from("out"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(denied.guidance().unwrap().contains("write access"));
    }
}
