//! The [`StreamAnalyzer`] port.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::types::StreamAnalysis;

/// Produces a [`StreamAnalysis`] for a source file.
///
/// Implementations must return [`ef_core::Error::NotFound`] when the file
/// does not exist, and must be safe to share across tasks.
#[async_trait]
pub trait StreamAnalyzer: Send + Sync {
    /// Human-readable name identifying this analyzer implementation.
    fn name(&self) -> &'static str;

    async fn analyze(&self, path: &Path) -> ef_core::Result<StreamAnalysis>;
}

#[async_trait]
impl<T: StreamAnalyzer + ?Sized> StreamAnalyzer for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn analyze(&self, path: &Path) -> ef_core::Result<StreamAnalysis> {
        (**self).analyze(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ef_core::Error;

    struct Fixed;

    #[async_trait]
    impl StreamAnalyzer for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn analyze(&self, path: &Path) -> ef_core::Result<StreamAnalysis> {
            if path.ends_with("missing.mkv") {
                return Err(Error::not_found("file", path.display()));
            }
            Ok(StreamAnalysis::new(path))
        }
    }

    #[tokio::test]
    async fn arc_delegates() {
        let analyzer: Arc<dyn StreamAnalyzer> = Arc::new(Fixed);
        assert_eq!(analyzer.name(), "fixed");
        let analysis = analyzer.analyze(Path::new("/a.mkv")).await.unwrap();
        assert_eq!(analysis.path, Path::new("/a.mkv"));
        let err = analyzer.analyze(Path::new("/missing.mkv")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
