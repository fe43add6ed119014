/// Compute backend the runtime should execute on. `Other` carries a
/// normalized identifier the curated mapping does not know; the runtime
/// decides at model-load time whether it is supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendChoice {
    Cpu,
    Cuda,
    DirectMl,
    CoreMl,
    Other(String),
}

impl BackendChoice {
    /// `None` means no override: the runtime keeps its default backend.
    pub fn from_provider(provider: Option<&str>) -> Option<Self> {
        let normalized = provider?.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return None;
        }
        Some(match normalized.as_str() {
            "cpu" => Self::Cpu,
            "cuda" => Self::Cuda,
            "directml" | "dml" => Self::DirectMl,
            "coreml" => Self::CoreMl,
            _ => Self::Other(normalized),
        })
    }

    pub fn identifier(&self) -> &str {
        match self {
            Self::Cpu => "CPUExecutionProvider",
            Self::Cuda => "CUDAExecutionProvider",
            Self::DirectMl => "DmlExecutionProvider",
            Self::CoreMl => "CoreMLExecutionProvider",
            Self::Other(identifier) => identifier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(
            BackendChoice::from_provider(Some(" CUDA ")),
            BackendChoice::from_provider(Some("cuda")),
        );
        assert_eq!(
            BackendChoice::from_provider(Some("cuda")),
            Some(BackendChoice::Cuda)
        );
    }

    #[test]
    fn maps_curated_names() {
        assert_eq!(
            BackendChoice::from_provider(Some("cpu")).unwrap().identifier(),
            "CPUExecutionProvider"
        );
        assert_eq!(
            BackendChoice::from_provider(Some("directml")),
            Some(BackendChoice::DirectMl)
        );
        assert_eq!(
            BackendChoice::from_provider(Some("dml")),
            Some(BackendChoice::DirectMl)
        );
        assert_eq!(
            BackendChoice::from_provider(Some("CoreML")).unwrap().identifier(),
            "CoreMLExecutionProvider"
        );
    }

    #[test]
    fn passes_unknown_names_through() {
        let choice = BackendChoice::from_provider(Some("mycustomep")).unwrap();
        assert_eq!(choice, BackendChoice::Other("mycustomep".into()));
        assert_eq!(choice.identifier(), "mycustomep");
    }

    #[test]
    fn absent_or_blank_means_no_override() {
        assert_eq!(BackendChoice::from_provider(None), None);
        assert_eq!(BackendChoice::from_provider(Some("")), None);
        assert_eq!(BackendChoice::from_provider(Some("   ")), None);
    }
}
