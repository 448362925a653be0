//! Parsing for Kubernetes resource quantity strings (`"500m"`, `"2"`, `"512Mi"`, `"1Gi"`).
//! `k8s_openapi::Quantity` is just a newtype around `String`; arithmetic needs the value
//! quantized first.

const BINARY_SUFFIXES: &[(&str, i64)] = &[
    ("Ki", 1i64 << 10),
    ("Mi", 1i64 << 20),
    ("Gi", 1i64 << 30),
    ("Ti", 1i64 << 40),
];

const DECIMAL_SUFFIXES: &[(&str, i64)] = &[
    ("k", 1_000),
    ("K", 1_000),
    ("M", 1_000_000),
    ("G", 1_000_000_000),
    ("T", 1_000_000_000_000),
];

/// Parses a CPU quantity into millicores: `"500m"` -> 500, `"2"` -> 2000.
pub fn parse_cpu_millis(s: &str) -> i64 {
    let s = s.trim();
    if let Some(stripped) = s.strip_suffix('m') {
        return stripped.parse::<f64>().unwrap_or(0.0).round() as i64;
    }
    (s.parse::<f64>().unwrap_or(0.0) * 1000.0).round() as i64
}

/// Parses a memory quantity into bytes, honoring binary (`Ki`/`Mi`/`Gi`/`Ti`) and decimal
/// (`k`/`M`/`G`/`T`) suffixes. A bare number is already bytes.
pub fn parse_memory_bytes(s: &str) -> i64 {
    let s = s.trim();
    for (suffix, scale) in BINARY_SUFFIXES {
        if let Some(stripped) = s.strip_suffix(suffix) {
            return (stripped.parse::<f64>().unwrap_or(0.0) * *scale as f64).round() as i64;
        }
    }
    for (suffix, scale) in DECIMAL_SUFFIXES {
        if let Some(stripped) = s.strip_suffix(suffix) {
            return (stripped.parse::<f64>().unwrap_or(0.0) * *scale as f64).round() as i64;
        }
    }
    s.parse::<f64>().unwrap_or(0.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_millicores() {
        assert_eq!(parse_cpu_millis("500m"), 500);
        assert_eq!(parse_cpu_millis("2"), 2000);
        assert_eq!(parse_cpu_millis("0.5"), 500);
    }

    #[test]
    fn memory_binary_and_decimal() {
        assert_eq!(parse_memory_bytes("1Gi"), 1 << 30);
        assert_eq!(parse_memory_bytes("512Mi"), 512 * (1 << 20));
        assert_eq!(parse_memory_bytes("1000000"), 1_000_000);
        assert_eq!(parse_memory_bytes("2G"), 2_000_000_000);
    }
}
