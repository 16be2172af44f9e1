//! Image probe trait and shared types.
//!
//! The production implementation is
//! [`ImageCrateProbe`](super::rust_backend::ImageCrateProbe). Tests use
//! [`tests::MockProbe`], which records every path it is asked about.

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot identify {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// Intrinsic pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Reads intrinsic dimensions without decoding pixel data.
///
/// `Sync` so the process stage can share one probe across its rayon pool.
pub trait ImageProbe: Sync {
    fn identify(&self, path: &Path) -> Result<Dimensions, ProbeError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock probe that answers from a table keyed by file name.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockProbe {
        pub sizes: HashMap<String, Dimensions>,
        pub calls: Mutex<Vec<String>>,
    }

    impl MockProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_size(mut self, file_name: &str, width: u32, height: u32) -> Self {
            self.sizes
                .insert(file_name.to_string(), Dimensions { width, height });
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ImageProbe for MockProbe {
        fn identify(&self, path: &Path) -> Result<Dimensions, ProbeError> {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.calls.lock().unwrap().push(name.clone());
            self.sizes
                .get(&name)
                .copied()
                .ok_or_else(|| ProbeError::Unreadable {
                    path: name,
                    reason: "no mock size".to_string(),
                })
        }
    }

    #[test]
    fn mock_answers_known_files() {
        let probe = MockProbe::new().with_size("gold.png", 80, 80);
        let dims = probe.identify(Path::new("/a/b/gold.png")).unwrap();
        assert_eq!(dims, Dimensions { width: 80, height: 80 });
        assert_eq!(probe.calls(), vec!["gold.png".to_string()]);
    }

    #[test]
    fn mock_rejects_unknown_files() {
        let probe = MockProbe::new();
        assert!(matches!(
            probe.identify(Path::new("missing.png")),
            Err(ProbeError::Unreadable { .. })
        ));
    }
}
