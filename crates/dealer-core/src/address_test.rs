use super::*;

fn parsed(street: &str, city: &str, state: &str, postal_code: &str) -> ParsedAddress {
    ParsedAddress {
        street: street.to_string(),
        city: city.to_string(),
        state: state.to_string(),
        postal_code: postal_code.to_string(),
    }
}

// ---------------------------------------------------------------------------
// parse_address: strict patterns
// ---------------------------------------------------------------------------

#[test]
fn parses_us_address_with_country_suffix() {
    assert_eq!(
        parse_address("222 W Merchandise Mart Plaza, Chicago, IL 60654, USA"),
        parsed("222 W Merchandise Mart Plaza", "Chicago", "IL", "60654")
    );
}

#[test]
fn parses_canadian_address_with_country_suffix() {
    assert_eq!(
        parse_address("123 Maple St, Toronto, ON M5V 3A1, Canada"),
        parsed("123 Maple St", "Toronto", "ON", "M5V 3A1")
    );
}

#[test]
fn inserts_space_into_unspaced_canadian_postal_code() {
    assert_eq!(
        parse_address("123 Maple St, Toronto, ON M5V3A1, Canada"),
        parsed("123 Maple St", "Toronto", "ON", "M5V 3A1")
    );
}

#[test]
fn parses_zip_plus_four() {
    assert_eq!(
        parse_address("500 Auto Mall Dr, Springfield, IL 62704-1234"),
        parsed("500 Auto Mall Dr", "Springfield", "IL", "62704-1234")
    );
}

#[test]
fn lowercase_state_accepted_without_country_and_uppercased() {
    assert_eq!(
        parse_address("1 Main St, Springfield, il 62701"),
        parsed("1 Main St", "Springfield", "IL", "62701")
    );
}

#[test]
fn multi_part_street_keeps_suite_in_street() {
    assert_eq!(
        parse_address("1 Main St, Suite 5, Chicago, IL 60654"),
        parsed("1 Main St, Suite 5", "Chicago", "IL", "60654")
    );
}

// ---------------------------------------------------------------------------
// parse_address: fallback
// ---------------------------------------------------------------------------

#[test]
fn fallback_handles_state_and_zip_in_separate_parts() {
    assert_eq!(
        parse_address("1 Main St, Springfield, IL, 62701, USA"),
        parsed("1 Main St", "Springfield", "IL", "62701")
    );
}

#[test]
fn fallback_reads_state_and_zip_tokens_from_last_part() {
    assert_eq!(
        parse_address("1 Main St, Springfield, IL 62701 USA"),
        parsed("1 Main St", "Springfield", "IL", "62701")
    );
}

#[test]
fn fallback_single_token_tail_without_pair_leaves_state_empty() {
    assert_eq!(
        parse_address("1 Main St, Springfield, Illinois"),
        parsed("1 Main St", "Springfield", "", "")
    );
}

#[test]
fn empty_input_returns_empty() {
    assert!(parse_address("").is_empty());
    assert!(parse_address("   ").is_empty());
}

#[test]
fn unstructured_phrase_returns_empty_rather_than_guessing() {
    assert!(parse_address("Visit our showroom today").is_empty());
    assert!(parse_address("Call us, anytime").is_empty());
}

#[test]
fn reparsing_canonical_output_is_idempotent() {
    let inputs = [
        "222 W Merchandise Mart Plaza, Chicago, IL 60654, USA",
        "1 Main St, Springfield, IL 62701",
        "123 Maple St, Toronto, ON M5V3A1",
        "9 Elm Rd, Suite 100, Austin, TX 78701-0001",
    ];
    for input in inputs {
        let first = parse_address(input);
        let rendered = format!(
            "{}, {}, {} {}",
            first.street, first.city, first.state, first.postal_code
        );
        let second = parse_address(&rendered);
        assert_eq!(first, second, "re-parse of {rendered:?} drifted");
    }
}

// ---------------------------------------------------------------------------
// extract_state_postal / format_postal_code
// ---------------------------------------------------------------------------

#[test]
fn extract_state_postal_prefers_canadian_pattern() {
    assert_eq!(
        extract_state_postal("Calgary AB T2P 1J9"),
        ("AB".to_string(), "T2P 1J9".to_string())
    );
    assert_eq!(
        extract_state_postal("Dallas TX 75201"),
        ("TX".to_string(), "75201".to_string())
    );
    assert_eq!(extract_state_postal("nowhere"), (String::new(), String::new()));
}

#[test]
fn format_postal_code_leaves_us_zip_alone() {
    assert_eq!(format_postal_code("60654"), "60654");
    assert_eq!(format_postal_code("m5v3a1"), "M5V 3A1");
}

// ---------------------------------------------------------------------------
// normalize_address_abbreviations
// ---------------------------------------------------------------------------

#[test]
fn abbreviates_street_suffixes_case_insensitively() {
    assert_eq!(
        normalize_address_abbreviations("100 north main STREET"),
        "100 North Main St"
    );
    assert_eq!(
        normalize_address_abbreviations("55 Sunset Boulevard"),
        "55 Sunset Blvd"
    );
    assert_eq!(
        normalize_address_abbreviations("7 Lake Shore Parkway"),
        "7 Lake Shore Pkwy"
    );
}

#[test]
fn restores_compass_tokens_and_trims_trailing_punctuation() {
    assert_eq!(
        normalize_address_abbreviations("1200 nw highway 7, "),
        "1200 NW Hwy 7"
    );
}

#[test]
fn does_not_abbreviate_inside_longer_words() {
    assert_eq!(
        normalize_address_abbreviations("10 Streetsboro Road"),
        "10 Streetsboro Rd"
    );
}

#[test]
fn title_case_keeps_ordinals_and_possessives() {
    assert_eq!(title_case("1200 4th avenue"), "1200 4th Avenue");
    assert_eq!(title_case("rick's auto"), "Rick's Auto");
    assert_eq!(title_case("mercedes-benz of x"), "Mercedes-Benz Of X");
}

#[test]
fn restore_uppercase_tokens_fixes_brand_and_suffix_tokens() {
    assert_eq!(
        restore_uppercase_tokens("Smith Buick Gmc Llc"),
        "Smith Buick GMC LLC"
    );
}
