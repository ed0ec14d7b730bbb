use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating S3 bucket names
    /// 3-63 characters, lowercase letters, digits, dots and hyphens,
    /// starting and ending with a letter or digit
    /// - Valid: "default", "reports-2024", "my.bucket"
    /// - Invalid: "ab", "Reports", "-bucket", "bucket-", "my_bucket"
    pub static ref BUCKET_NAME_REGEX: Regex =
        Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").unwrap();

    /// Bucket names must not look like an IPv4 address
    static ref IPV4_REGEX: Regex = Regex::new(r"^\d{1,3}(\.\d{1,3}){3}$").unwrap();
}

/// Check a bucket name against the S3 naming rules
pub fn is_valid_bucket_name(name: &str) -> bool {
    BUCKET_NAME_REGEX.is_match(name) && !IPV4_REGEX.is_match(name) && !name.contains("..")
}
