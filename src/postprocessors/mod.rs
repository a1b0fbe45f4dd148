//! Content post-processor pipeline.
//!
//! Post-processors run over every produced OLX node after its content
//! processor finished, in configured order. They mutate nodes in place
//! and never fail: a link that cannot be rewritten is left alone and
//! logged.

pub mod static_links;

use crate::cartridge::Cartridge;
use crate::config::ConfigError;
use crate::olx::OlxNode;
use crate::processors::ProcessorContext;

/// Names accepted in the configured post-processor list, in the default
/// chain order.
pub const POST_PROCESSOR_NAMES: &[&str] = &["static_links"];

/// One node-rewriting pass applied after content processing.
pub trait ContentPostProcessor {
    fn name(&self) -> &'static str;

    fn process(&self, node: &mut OlxNode, cartridge: &Cartridge, context: &ProcessorContext);
}

/// Build the post-processor chain from configured names.
pub fn build_registry(names: &[String]) -> Result<Vec<Box<dyn ContentPostProcessor>>, ConfigError> {
    names
        .iter()
        .map(|name| -> Result<Box<dyn ContentPostProcessor>, ConfigError> {
            match name.as_str() {
                "static_links" => Ok(Box::new(static_links::StaticLinkPostProcessor)),
                other => Err(ConfigError::UnknownPostProcessor(other.to_string())),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_all_names() {
        let names: Vec<String> = POST_PROCESSOR_NAMES.iter().map(|s| s.to_string()).collect();
        let registry = build_registry(&names).unwrap();
        assert_eq!(registry.len(), POST_PROCESSOR_NAMES.len());
    }

    #[test]
    fn test_registry_rejects_unknown_name() {
        let names = vec!["mangler".to_string()];
        assert!(matches!(
            build_registry(&names),
            Err(ConfigError::UnknownPostProcessor(name)) if name == "mangler"
        ));
    }
}
