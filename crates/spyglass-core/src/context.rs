use crate::caches::ReflectionCaches;
use crate::classify::ValueClassifier;
use crate::config::SpyglassConfig;
use crate::evaluator::CodeEvaluator;
use crate::host::Reflection;
use crate::ivalue::EditorPool;

/// Shared services handed down to every entry, editor and controller call
pub struct InspectContext<'a> {
    pub host: &'a dyn Reflection,
    pub caches: &'a ReflectionCaches,
    pub config: &'a SpyglassConfig,
    pub editors: &'a mut EditorPool,
    pub evaluator: Option<&'a dyn CodeEvaluator>,
}

impl<'a> InspectContext<'a> {
    pub fn classifier(&self) -> ValueClassifier<'_> {
        ValueClassifier::new(self.host, self.caches, &self.config.collection_exclusions)
    }
}
