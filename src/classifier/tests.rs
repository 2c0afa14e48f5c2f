use super::*;

#[test]
fn test_is_loopback_literals() {
    assert!(is_loopback("127.0.0.1"));
    assert!(is_loopback("::1"));
}

#[test]
fn test_is_loopback_is_exact_match_only() {
    assert!(!is_loopback("127.0.0.2"));
    assert!(!is_loopback("localhost"));
    assert!(!is_loopback("0:0:0:0:0:0:0:1"));
    assert!(!is_loopback("::ffff:127.0.0.1"));
}

#[test]
fn test_is_ipv4_mapped_ipv6_for_mapped_addresses() {
    for ipv4 in ["203.0.113.5", "0.0.0.0", "255.255.255.255", "10.1.2.3"] {
        assert!(is_ipv4_mapped_ipv6(&format!("::ffff:{ipv4}")), "{ipv4}");
    }
    // hex form of ::ffff:203.0.113.5
    assert!(is_ipv4_mapped_ipv6("::ffff:cb00:7105"));
}

#[test]
fn test_is_ipv4_mapped_ipv6_for_plain_ipv6() {
    assert!(!is_ipv4_mapped_ipv6("::1"));
    assert!(!is_ipv4_mapped_ipv6("2001:db8::1"));
    assert!(!is_ipv4_mapped_ipv6("fe80::1"));
    // IPv4-compatible (deprecated) form lacks the 0xffff marker
    assert!(!is_ipv4_mapped_ipv6("::203.0.113.5"));
    assert!(!is_ipv4_mapped_ipv6("::fffe:203.0.113.5"));
}

#[test]
fn test_is_ipv4_mapped_ipv6_malformed_input() {
    assert!(!is_ipv4_mapped_ipv6(""));
    assert!(!is_ipv4_mapped_ipv6("203.0.113.5"));
    assert!(!is_ipv4_mapped_ipv6("::ffff:999.0.0.1"));
    assert!(!is_ipv4_mapped_ipv6("not an address"));
}

#[test]
fn test_extract_ipv4_from_mapped() {
    for ipv4 in ["203.0.113.5", "192.168.0.1", "1.2.3.4"] {
        assert_eq!(extract_ipv4(&format!("::ffff:{ipv4}")).unwrap(), ipv4);
    }
    assert_eq!(extract_ipv4("::ffff:cb00:7105").unwrap(), "203.0.113.5");
}

#[test]
fn test_extract_ipv4_rejects_non_mapped() {
    assert_eq!(
        extract_ipv4("2001:db8::1"),
        Err(ClassifyError::InvalidAddressKind("2001:db8::1".to_string()))
    );
    assert!(extract_ipv4("203.0.113.5").is_err());
    assert!(extract_ipv4("garbage").is_err());
}

#[test]
fn test_classify_unwraps_mapped_address() {
    assert_eq!(
        classify("::ffff:203.0.113.5"),
        (Family::Ipv4, "203.0.113.5".to_string())
    );
}

#[test]
fn test_classify_tags_by_colon() {
    assert_eq!(
        classify("2001:db8::42"),
        (Family::Ipv6, "2001:db8::42".to_string())
    );
    assert_eq!(
        classify("198.51.100.7"),
        (Family::Ipv4, "198.51.100.7".to_string())
    );
}

#[test]
fn test_classify_malformed_without_colon_defaults_to_ipv4() {
    assert_eq!(classify("bogus"), (Family::Ipv4, "bogus".to_string()));
}

#[test]
fn test_family_display() {
    assert_eq!(Family::Ipv4.to_string(), "ipv4");
    assert_eq!(Family::Ipv6.to_string(), "ipv6");
}
