use std::{fmt, str::FromStr};

/// The published segment catalogs a run can be pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogSelector {
    BalancedTrain,
    Eval,
    UnbalancedTrain,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown segment catalog '{0}', expected one of: eval_segments.csv, balanced_train_segments.csv, unbalanced_train_segments.csv")]
pub struct UnknownSelector(pub String);

impl CatalogSelector {
    /// Processing order used when no catalog is selected.
    pub const ALL: [Self; 3] = [Self::BalancedTrain, Self::Eval, Self::UnbalancedTrain];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::BalancedTrain => "balanced_train_segments.csv",
            Self::Eval => "eval_segments.csv",
            Self::UnbalancedTrain => "unbalanced_train_segments.csv",
        }
    }

    /// Expands an optional selection into the catalogs to process.
    pub fn selected(selection: Option<Self>) -> Vec<Self> {
        match selection {
            Some(selector) => vec![selector],
            None => Self::ALL.to_vec(),
        }
    }
}

impl FromStr for CatalogSelector {
    type Err = UnknownSelector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|selector| selector.file_name() == s)
            .ok_or_else(|| UnknownSelector(s.to_string()))
    }
}

impl fmt::Display for CatalogSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_file_names() {
        for selector in CatalogSelector::ALL {
            assert_eq!(selector.file_name().parse::<CatalogSelector>(), Ok(selector));
        }
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            "eval_segments".parse::<CatalogSelector>(),
            Err(UnknownSelector("eval_segments".to_string()))
        );
    }

    #[test]
    fn no_selection_means_all_three_in_order() {
        assert_eq!(
            CatalogSelector::selected(None),
            [
                CatalogSelector::BalancedTrain,
                CatalogSelector::Eval,
                CatalogSelector::UnbalancedTrain
            ]
        );
        assert_eq!(
            CatalogSelector::selected(Some(CatalogSelector::Eval)),
            [CatalogSelector::Eval]
        );
    }
}
