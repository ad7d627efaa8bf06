use once_cell::sync::OnceCell;
use std::{
    fmt::Display,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("No model candidates configured")]
    NoCandidates,
    #[error("None of the candidate models could be loaded (tried: {})", .tried.join(", "))]
    NoUsableModel { tried: Vec<String> },
}

/// Tries each candidate in order and returns the first model that loads.
/// Candidates after the first success are never touched.
pub fn load_first_available<M, E, F>(
    candidates: &[PathBuf],
    mut loader: F,
) -> Result<M, ModelLoadError>
where
    F: FnMut(&Path) -> Result<M, E>,
    E: Display,
{
    if candidates.is_empty() {
        return Err(ModelLoadError::NoCandidates);
    }

    let mut tried = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match loader(candidate) {
            Ok(model) => {
                tracing::info!("Loaded model from {}", candidate.display());
                return Ok(model);
            }
            Err(e) => {
                tracing::warn!("Failed to load model {}: {}", candidate.display(), e);
                tried.push(candidate.display().to_string());
            }
        }
    }

    Err(ModelLoadError::NoUsableModel { tried })
}

/// Init-once holder for the served model. A successful load is kept for the
/// lifetime of the cache; a failed one leaves it empty.
pub struct ModelCache<M> {
    cell: OnceCell<Arc<M>>,
}

impl<M> ModelCache<M> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get(&self) -> Option<Arc<M>> {
        self.cell.get().cloned()
    }

    pub fn get_or_load<E, F>(&self, load: F) -> Result<Arc<M>, E>
    where
        F: FnOnce() -> Result<M, E>,
    {
        self.cell.get_or_try_init(|| load().map(Arc::new)).cloned()
    }
}

impl<M> Default for ModelCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn candidates() -> Vec<PathBuf> {
        ["a.onnx", "b.onnx", "c.onnx"]
            .iter()
            .map(PathBuf::from)
            .collect()
    }

    #[test]
    fn test_first_success_wins_and_stops() {
        let attempts = RefCell::new(Vec::new());

        let model = load_first_available(&candidates(), |path| {
            attempts.borrow_mut().push(path.to_path_buf());
            if path == Path::new("a.onnx") {
                Err("corrupt file")
            } else {
                Ok(path.display().to_string())
            }
        })
        .unwrap();

        assert_eq!(model, "b.onnx");
        assert_eq!(
            attempts.into_inner(),
            vec![PathBuf::from("a.onnx"), PathBuf::from("b.onnx")]
        );
    }

    #[test]
    fn test_all_candidates_fail() {
        let result: Result<(), _> = load_first_available(&candidates(), |_| Err("missing"));

        match result {
            Err(ModelLoadError::NoUsableModel { tried }) => {
                assert_eq!(tried, vec!["a.onnx", "b.onnx", "c.onnx"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_no_candidates() {
        let result: Result<(), ModelLoadError> =
            load_first_available::<(), &str, _>(&[], |_| Ok(()));

        assert!(matches!(result, Err(ModelLoadError::NoCandidates)));
    }

    #[test]
    fn test_cache_loads_once() {
        let cache: ModelCache<u32> = ModelCache::new();
        let calls = RefCell::new(0);

        for _ in 0..3 {
            let model = cache
                .get_or_load(|| {
                    *calls.borrow_mut() += 1;
                    Ok::<_, String>(7)
                })
                .unwrap();
            assert_eq!(*model, 7);
        }

        assert_eq!(*calls.borrow(), 1);
        assert_eq!(cache.get().as_deref(), Some(&7));
    }

    #[test]
    fn test_cache_does_not_keep_failures() {
        let cache: ModelCache<u32> = ModelCache::new();

        let failed = cache.get_or_load(|| Err::<u32, _>("boom"));
        assert!(failed.is_err());
        assert!(cache.get().is_none());

        let loaded = cache.get_or_load(|| Ok::<_, &str>(1)).unwrap();
        assert_eq!(*loaded, 1);
    }
}
