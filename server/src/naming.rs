//! Name and key validation for storage resources

use crate::error::{GatewayError, GatewayResult};

const MAX_KEY_LEN: usize = 1024;

/// Table names: 3-63 ASCII alphanumerics, starting with a letter
pub fn validate_table_name(name: &str) -> GatewayResult<()> {
    let len_ok = (3..=63).contains(&name.len());
    let starts_alpha = name.chars().next().map_or(false, |c| c.is_ascii_alphabetic());
    if !len_ok || !starts_alpha || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(GatewayError::invalid(format!("invalid table name: {:?}", name)));
    }
    Ok(())
}

/// Container, queue and share names: 3-63 lowercase letters, digits and single
/// hyphens, starting and ending with a letter or digit.
pub fn validate_resource_name(kind: &str, name: &str) -> GatewayResult<()> {
    let bytes = name.as_bytes();
    let valid = (3..=63).contains(&bytes.len())
        && bytes.iter().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[0] != b'-'
        && bytes[bytes.len() - 1] != b'-'
        && !name.contains("--");
    if !valid {
        return Err(GatewayError::invalid(format!("invalid {} name: {:?}", kind, name)));
    }
    Ok(())
}

/// Partition and row keys
pub fn validate_key(label: &str, key: &str) -> GatewayResult<()> {
    if key.is_empty() {
        return Err(GatewayError::invalid(format!("{} must not be empty", label)));
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(GatewayError::invalid(format!("{} exceeds {} characters", label, MAX_KEY_LEN)));
    }
    if key.chars().any(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_control()) {
        return Err(GatewayError::invalid(format!("{} contains a forbidden character: {:?}", label, key)));
    }
    Ok(())
}

/// A single path segment: blob names, share directories and file names
pub fn validate_segment(kind: &str, name: &str) -> GatewayResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.chars().any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(GatewayError::invalid(format!("invalid {} name: {:?}", kind, name)));
    }
    Ok(())
}

/// Reduce a caller-supplied filename to its final path component
pub fn base_file_name(file_name: &str) -> GatewayResult<String> {
    let base = file_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();
    validate_segment("file", base)?;
    Ok(base.to_string())
}

/// Lower-cased extension including the dot, if any
pub fn extension(file_name: &str) -> Option<String> {
    let base = file_name.rsplit(|c| c == '/' || c == '\\').next()?;
    match base.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < base.len() => Some(base[idx..].to_ascii_lowercase()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert!(validate_table_name("Customers").is_ok());
        assert!(validate_table_name("Orders2024").is_ok());
        assert!(validate_table_name("ab").is_err());
        assert!(validate_table_name("1Orders").is_err());
        assert!(validate_table_name("order-items").is_err());
    }

    #[test]
    fn test_resource_names() {
        assert!(validate_resource_name("container", "product-images").is_ok());
        assert!(validate_resource_name("queue", "stock-updates").is_ok());
        assert!(validate_resource_name("queue", "Stock").is_err());
        assert!(validate_resource_name("queue", "-stock").is_err());
        assert!(validate_resource_name("queue", "stock-").is_err());
        assert!(validate_resource_name("queue", "stock--updates").is_err());
        assert!(validate_resource_name("share", "ab").is_err());
    }

    #[test]
    fn test_keys() {
        assert!(validate_key("RowKey", "c1").is_ok());
        assert!(validate_key("RowKey", "").is_err());
        assert!(validate_key("RowKey", "a/b").is_err());
        assert!(validate_key("RowKey", "a#b").is_err());
        assert!(validate_key("PartitionKey", "tab\there").is_err());
    }

    #[test]
    fn test_base_file_name_strips_directories() {
        assert_eq!(base_file_name("proof.pdf").unwrap(), "proof.pdf");
        assert_eq!(base_file_name("C:\\Users\\me\\proof.pdf").unwrap(), "proof.pdf");
        assert_eq!(base_file_name("../../etc/passwd").unwrap(), "passwd");
        assert!(base_file_name("uploads/").is_err());
        assert!(base_file_name("..").is_err());
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("photo.JPG"), Some(".jpg".to_string()));
        assert_eq!(extension("archive.tar.gz"), Some(".gz".to_string()));
        assert_eq!(extension("README"), None);
        assert_eq!(extension(".hidden"), None);
        assert_eq!(extension("trailing."), None);
    }
}
