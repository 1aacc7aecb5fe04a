use crate::ast::*;
use crate::catalog::TypeCatalog;
use crate::error::{LinkError, LinkErrorKind};

/// Check that `attribute` may be read from `target`. Runs inline for every
/// attribute reference and placeholder the resolver substitutes.
pub(super) fn validate_attribute(
    source: &str,
    target: &Entity,
    attribute: &str,
    location: &str,
    catalog: &dyn TypeCatalog,
) -> Result<(), LinkError> {
    let invalid = |message: String| {
        LinkError::new(2, LinkErrorKind::InvalidAttribute, source, message)
            .with_reference(&target.full_name)
            .with_location(location)
    };

    if !target.kind.exposes_attributes() {
        return Err(invalid(format!(
            "attribute '{}' requested from '{}', but a {} has no attributes",
            attribute, target.full_name, target.kind
        )));
    }
    if target.has_pragma(&Pragma::NoTypeValidation) {
        return Ok(());
    }
    if !catalog.is_attribute_supported(&target.type_name, attribute) {
        return Err(invalid(format!(
            "'{}' of type '{}' has no attribute '{}'",
            target.full_name, target.type_name, attribute
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PermissiveCatalog, StaticCatalog};

    fn queue() -> Entity {
        Entity::new("R", EntityKind::Resource, Value::string("r")).with_type("Queue")
    }

    #[test]
    fn value_kind_never_has_attributes() {
        let target = Entity::new("V", EntityKind::Value, Value::string("v"))
            .with_pragma(Pragma::NoTypeValidation);
        let err = validate_attribute("F", &target, "Arn", "F", &PermissiveCatalog).unwrap_err();
        assert_eq!(err.kind, LinkErrorKind::InvalidAttribute);
        assert_eq!(err.reference.as_deref(), Some("V"));
    }

    #[test]
    fn catalog_decides_for_resources() {
        let catalog = StaticCatalog::new().with_type("Queue", ["QueueName"]);
        let err = validate_attribute("F", &queue(), "Arn", "F/x", &catalog).unwrap_err();
        assert!(err.message.contains("'R'") && err.message.contains("'Arn'"));
        assert_eq!(err.location.as_deref(), Some("F/x"));
        assert!(validate_attribute("F", &queue(), "QueueName", "F", &catalog).is_ok());
    }

    #[test]
    fn pragma_skips_catalog() {
        let target = queue().with_pragma(Pragma::NoTypeValidation);
        assert!(validate_attribute("F", &target, "Arn", "F", &StaticCatalog::new()).is_ok());
    }
}
