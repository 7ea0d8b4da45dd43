use crate::cloud_error::FieldError;
use std::net::IpAddr;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Flattens `validator` output into field errors with dotted camelCase paths,
/// sorted by path.
pub fn field_errors(prefix: &str, errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out = Vec::new();
    collect(prefix, errors, &mut out);
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

fn collect(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors().iter() {
        let name: &str = field.as_ref();
        let path = join(prefix, &camel_case(name));
        match kind {
            ValidationErrorsKind::Field(items) => {
                for item in items {
                    let message = item
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for '{path}' ({})", item.code));
                    out.push(FieldError::new(path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    collect(&format!("{path}[{idx}]"), inner, out);
                }
            }
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

pub fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Checks `name` against a length range and an alphanumeric-with-hyphens shape
/// that must start with a letter and end with a letter or digit.
pub fn validate_resource_name(
    name: &str,
    min: usize,
    max: usize,
    lowercase_only: bool,
    errors: &mut Vec<FieldError>,
) {
    let chars: Vec<char> = name.chars().collect();
    let shape_ok = chars.len() >= min
        && chars.len() <= max
        && chars.first().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.last().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.iter().all(|c| c.is_ascii_alphanumeric() || *c == '-')
        && (!lowercase_only || !chars.iter().any(|c| c.is_ascii_uppercase()));
    if !shape_ok {
        errors.push(FieldError::new(
            "name",
            format!(
                "Invalid resource name '{name}': must be {min}-{max} characters, start with a letter, end with a letter or digit, and contain only {}letters, digits and hyphens",
                if lowercase_only { "lowercase " } else { "" }
            ),
        ));
    }
}

pub fn validate_cidr(field: &str, value: Option<&str>, errors: &mut Vec<FieldError>) {
    let Some(value) = value else { return };
    let valid = value
        .split_once('/')
        .and_then(|(ip, len)| {
            let ip: IpAddr = ip.parse().ok()?;
            let len: u8 = len.parse().ok()?;
            let max = if ip.is_ipv4() { 32 } else { 128 };
            (len <= max).then_some(())
        })
        .is_some();
    if !valid {
        errors.push(FieldError::new(
            field,
            format!("Invalid CIDR '{value}'"),
        ));
    }
}

pub fn validate_one_of(
    field: &str,
    value: Option<&str>,
    allowed: &[&str],
    errors: &mut Vec<FieldError>,
) {
    if let Some(value) = value {
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
            errors.push(FieldError::new(
                field,
                format!(
                    "Invalid value '{value}' for field '{field}' (must be one of: {})",
                    allowed.join(" ")
                ),
            ));
        }
    }
}

/// Parses `major.minor[.patch]`.
pub fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    if let Some(patch) = parts.next() {
        patch.parse::<u32>().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor))
}

pub fn validate_version(field: &str, value: Option<&str>, errors: &mut Vec<FieldError>) {
    if let Some(v) = value {
        if parse_version(v).is_none() {
            errors.push(FieldError::new(
                field,
                format!("Invalid OpenShift version '{v}'"),
            ));
        }
    }
}

/// Records an error when an immutable field changed between `old` and `new`.
pub fn check_immutable<T: PartialEq>(
    field: &str,
    old: &T,
    new: &T,
    errors: &mut Vec<FieldError>,
) {
    if old != new {
        errors.push(FieldError::new(
            field,
            format!("Field '{field}' cannot be changed after creation"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_conversion() {
        assert_eq!(camel_case("dns_base_domain_prefix"), "dnsBaseDomainPrefix");
        assert_eq!(camel_case("name"), "name");
    }

    #[test]
    fn cidr_checks() {
        let mut errors = Vec::new();
        validate_cidr("a", Some("10.0.0.0/16"), &mut errors);
        validate_cidr("b", Some("10.0.0.0/33"), &mut errors);
        validate_cidr("c", Some("nonsense"), &mut errors);
        validate_cidr("d", None, &mut errors);
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["b", "c"]);
    }

    #[test]
    fn version_parsing() {
        assert_eq!(parse_version("4.19"), Some((4, 19)));
        assert_eq!(parse_version("4.19.2"), Some((4, 19)));
        assert_eq!(parse_version("4"), None);
        assert_eq!(parse_version("4.x"), None);
    }

    #[test]
    fn resource_names() {
        let mut errors = Vec::new();
        validate_resource_name("dev-cluster", 3, 54, false, &mut errors);
        assert!(errors.is_empty());
        validate_resource_name("-bad", 3, 54, false, &mut errors);
        validate_resource_name("Upper", 3, 15, true, &mut errors);
        assert_eq!(errors.len(), 2);
    }
}
