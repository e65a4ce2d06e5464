use super::*;

#[test]
fn parses_positional_group_and_url() {
    let cli = Cli::try_parse_from(["dealer-cli", "Lakeside Auto", "https://lakesideauto.com/locations"])
        .expect("expected valid cli args");

    assert_eq!(cli.dealer_group, "Lakeside Auto");
    assert_eq!(cli.url, "https://lakesideauto.com/locations");
    assert_eq!(cli.format, OutputFormat::Json);
    assert!(cli.output.is_none());
    assert!(!cli.no_browser);
    assert!(!cli.no_llm);
}

#[test]
fn parses_output_flags() {
    let cli = Cli::try_parse_from([
        "dealer-cli",
        "--format",
        "tsv",
        "--output",
        "out.tsv",
        "--no-browser",
        "--no-llm",
        "--rules-path",
        "/tmp/rules.json",
        "Lakeside Auto",
        "https://lakesideauto.com",
    ])
    .expect("expected valid cli args");

    assert_eq!(ExportFormat::from(cli.format), ExportFormat::Tsv);
    assert_eq!(cli.output, Some(PathBuf::from("out.tsv")));
    assert!(cli.no_browser);
    assert!(cli.no_llm);
    assert_eq!(cli.rules_path, Some(PathBuf::from("/tmp/rules.json")));
}

#[test]
fn missing_url_is_rejected() {
    assert!(Cli::try_parse_from(["dealer-cli", "Lakeside Auto"]).is_err());
}

#[test]
fn unknown_format_is_rejected() {
    assert!(Cli::try_parse_from(["dealer-cli", "--format", "ods", "G", "https://g.com"]).is_err());
}

#[test]
fn xlsx_format_maps_to_spreadsheet_export() {
    let cli = Cli::try_parse_from([
        "dealer-cli",
        "--format",
        "xlsx",
        "--output",
        "dealers.xlsx",
        "Lakeside Auto",
        "https://lakesideauto.com",
    ])
    .expect("expected valid cli args");

    assert_eq!(cli.format, OutputFormat::Xlsx);
    assert_eq!(ExportFormat::from(cli.format), ExportFormat::Xlsx);
}
