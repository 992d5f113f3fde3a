use std::collections::{HashMap, HashSet};

/// Species name at one position of the classifier output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub struct ClassLabel(String);

impl ClassLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Label list is empty")]
    Empty,
    #[error("Label '{0}' appears more than once")]
    Duplicate(String),
    #[error("Classifier emits {width} scores but {labels} labels are configured")]
    WidthMismatch { width: usize, labels: usize },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Class index {index} has no label ({labels} labels configured)")]
pub struct LabelIndexError {
    pub index: usize,
    pub labels: usize,
}

/// Ordered labels plus the advice shown for each. The order is the one the
/// classifier was trained with.
#[derive(Debug, Clone)]
pub struct LabelCatalog {
    labels: Vec<ClassLabel>,
    advice: HashMap<String, String>,
    fallback: String,
}

impl LabelCatalog {
    pub fn new(
        labels: Vec<String>,
        advice: HashMap<String, String>,
        fallback: String,
    ) -> Result<Self, CatalogError> {
        if labels.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(CatalogError::Duplicate(label.clone()));
            }
        }
        for label in &labels {
            if !advice.contains_key(label) {
                log::warn!("No advice configured for label '{}', fallback will be used", label);
            }
        }
        for key in advice.keys() {
            if !seen.contains(key.as_str()) {
                log::warn!("Advice entry '{}' does not match any label", key);
            }
        }

        Ok(Self {
            labels: labels.into_iter().map(ClassLabel).collect(),
            advice,
            fallback,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[ClassLabel] {
        &self.labels
    }

    pub fn label(&self, index: usize) -> Result<&ClassLabel, LabelIndexError> {
        self.labels.get(index).ok_or(LabelIndexError {
            index,
            labels: self.labels.len(),
        })
    }

    pub fn advice_for(&self, label: &ClassLabel) -> &str {
        self.advice
            .get(label.as_str())
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    pub fn fallback_advice(&self) -> &str {
        &self.fallback
    }

    /// Startup check that every output position has a label and vice versa.
    pub fn check_width(&self, width: usize) -> Result<(), CatalogError> {
        if width != self.labels.len() {
            return Err(CatalogError::WidthMismatch {
                width,
                labels: self.labels.len(),
            });
        }
        Ok(())
    }
}
