//! Pointer keys, function ARNs and the stored pointer value.

use std::fmt;
use std::str::FromStr;

use crate::config::{RegistryConfig, is_segment};
use crate::error::RegistryError;

/// Unqualified function ARN, `arn:<partition>:lambda:<region>:<account>:function:<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionArn {
    value: String,
    region: String,
    account_id: String,
    function_name: String,
}

impl FunctionArn {
    /// Region the function lives in.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Owning account.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Deployed function name.
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// ARN text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl FromStr for FunctionArn {
    type Err = RegistryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| RegistryError::InvalidArn {
            value: value.to_string(),
            reason,
        };
        let parts: Vec<&str> = value.split(':').collect();
        if parts.len() < 7
            || parts[0] != "arn"
            || !parts[1].starts_with("aws")
            || parts[2] != "lambda"
            || parts[5] != "function"
        {
            return Err(invalid("not a function ARN"));
        }
        if parts.len() != 7 {
            return Err(invalid("qualified ARN, expected the unqualified function ARN"));
        }
        let (region, account, name) = (parts[3], parts[4], parts[6]);
        if region.is_empty()
            || !region
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(invalid("invalid region"));
        }
        if account.len() != 12 || !account.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("account id must be 12 digits"));
        }
        if name.is_empty()
            || name.len() > 64
            || !name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(invalid("invalid function name"));
        }
        Ok(Self {
            value: value.to_string(),
            region: region.to_string(),
            account_id: account.to_string(),
            function_name: name.to_string(),
        })
    }
}

impl fmt::Display for FunctionArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// `/<namespacePrefix>/<environment>/<consumerId>/<functionName>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PointerKey {
    path: String,
    function_name: String,
}

impl PointerKey {
    /// Builds the key for one function.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidFunctionName`] when the name cannot
    /// be a single key segment.
    pub fn new(config: &RegistryConfig, function_name: &str) -> Result<Self, RegistryError> {
        if !is_segment(function_name) {
            return Err(RegistryError::InvalidFunctionName(function_name.to_string()));
        }
        Ok(Self {
            path: format!(
                "/{}/{}/{}/{function_name}",
                config.namespace_prefix, config.environment, config.consumer_id
            ),
            function_name: function_name.to_string(),
        })
    }

    /// Logical function name (last segment).
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Full parameter name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for PointerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// A published function version. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPointerRecord {
    function_name: String,
    function_arn: FunctionArn,
    ordinal: u64,
}

impl VersionPointerRecord {
    /// Creates a record.
    #[must_use]
    pub const fn new(function_name: String, function_arn: FunctionArn, ordinal: u64) -> Self {
        Self {
            function_name,
            function_arn,
            ordinal,
        }
    }

    /// Logical function name.
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Unqualified function ARN.
    #[must_use]
    pub const fn function_arn(&self) -> &FunctionArn {
        &self.function_arn
    }

    /// Version ordinal.
    #[must_use]
    pub const fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Qualified ARN of this exact version, as an edge binding needs it.
    #[must_use]
    pub fn version_arn(&self) -> String {
        self.encode()
    }

    /// Stored value, `<functionArn>:<ordinal>`.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}:{}", self.function_arn, self.ordinal)
    }

    /// Parses a stored value read from `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MalformedPointer`] when the value is not
    /// an unqualified function ARN followed by a positive ordinal.
    pub fn decode(key: &PointerKey, value: &str) -> Result<Self, RegistryError> {
        let malformed = |reason: String| RegistryError::MalformedPointer {
            key: key.to_string(),
            reason,
        };
        let (arn, ordinal) = value
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| malformed("missing ordinal".to_string()))?;
        let ordinal: u64 = ordinal
            .parse()
            .map_err(|_| malformed(format!("ordinal '{ordinal}' is not a number")))?;
        if ordinal == 0 {
            return Err(malformed("ordinal must be positive".to_string()));
        }
        let function_arn = arn.parse::<FunctionArn>().map_err(|e| malformed(e.to_string()))?;
        Ok(Self::new(key.function_name().to_string(), function_arn, ordinal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:parseIdTokenToCredential-OR-edge-prod";

    fn key() -> PointerKey {
        let config = RegistryConfig::new("edge-auth", "prod", "LambdaEdgeStack").unwrap();
        PointerKey::new(&config, "parseIdTokenToCredential-OR").unwrap()
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(
            key().as_str(),
            "/edge-auth/prod/LambdaEdgeStack/parseIdTokenToCredential-OR"
        );
        let config = RegistryConfig::new("edge-auth", "prod", "LambdaEdgeStack").unwrap();
        assert!(PointerKey::new(&config, "a/b").is_err());
        assert!(PointerKey::new(&config, "").is_err());
    }

    #[test]
    fn test_function_arn_parts() {
        let arn: FunctionArn = ARN.parse().unwrap();
        assert_eq!(arn.region(), "us-east-1");
        assert_eq!(arn.account_id(), "123456789012");
        assert_eq!(arn.function_name(), "parseIdTokenToCredential-OR-edge-prod");
    }

    #[test]
    fn test_function_arn_rejections() {
        for bad in [
            "arn:aws:iam::123456789012:role/x",
            "arn:aws:lambda:us-east-1:123456789012:function:name:7",
            "arn:aws:lambda:us-east-1:12345:function:name",
            "arn:aws:lambda::123456789012:function:name",
            "arn:aws:lambda:us-east-1:123456789012:function:bad.name",
            "lambda:us-east-1",
        ] {
            assert!(matches!(
                bad.parse::<FunctionArn>(),
                Err(RegistryError::InvalidArn { .. })
            ), "{bad}");
        }
    }

    #[test]
    fn test_encode_decode() {
        let record = VersionPointerRecord::new(
            "parseIdTokenToCredential-OR".to_string(),
            ARN.parse().unwrap(),
            12,
        );
        assert_eq!(record.encode(), format!("{ARN}:12"));
        assert_eq!(VersionPointerRecord::decode(&key(), &record.encode()).unwrap(), record);
    }

    #[test]
    fn test_decode_malformed_values() {
        for bad in [
            "",
            ARN,
            &format!("{ARN}:latest"),
            &format!("{ARN}:0"),
            "arn:aws:iam::123456789012:role/x:3",
        ] {
            assert!(matches!(
                VersionPointerRecord::decode(&key(), bad),
                Err(RegistryError::MalformedPointer { .. })
            ), "{bad}");
        }
    }
}
