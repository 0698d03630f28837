use calamine::{Data, Reader, Xlsx, open_workbook};
use std::fs;
use tracing::info;

mod test_utils {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CRUMB: &str = "crumb42";

    pub async fn mount_json(
        server: &MockServer,
        url_path: &str,
        query: (&str, &str),
        body: String,
    ) {
        let mut mock = Mock::given(method("GET"))
            .and(path(url_path.to_string()))
            .and(query_param(query.0, query.1));
        if url_path.contains("/quoteSummary/") {
            mock = mock.and(query_param("crumb", CRUMB));
        }
        mock.respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    pub fn snapshot_body(currency: &str, market_cap: f64, price: f64, prev: f64) -> String {
        format!(
            r#"{{
                "quoteSummary": {{
                    "result": [{{
                        "price": {{"currency": "{currency}", "marketCap": {{"raw": {market_cap}}}}},
                        "summaryDetail": {{"trailingPE": {{"raw": 25.0}}, "previousClose": {{"raw": {prev}}}}},
                        "financialData": {{"financialCurrency": "{currency}", "currentPrice": {{"raw": {price}}}}}
                    }}],
                    "error": null
                }}
            }}"#
        )
    }

    pub fn quarterly_body(revenues: &[f64]) -> String {
        let statements = revenues
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    r#"{{"endDate": {{"raw": {}}}, "totalRevenue": {{"raw": {r}}}}}"#,
                    1_720_000_000 - (i as i64) * 7_776_000
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        format!(
            r#"{{
                "quoteSummary": {{
                    "result": [{{
                        "incomeStatementHistoryQuarterly": {{"incomeStatementHistory": [{statements}]}}
                    }}],
                    "error": null
                }}
            }}"#
        )
    }

    pub fn chart_body(closes: &[f64]) -> String {
        let closes = closes
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            r#"{{"chart": {{"result": [{{"indicators": {{"quote": [{{"close": [{closes}]}}]}}}}], "error": null}}}}"#
        )
    }

    /// Nike in USD, Adidas in EUR, and a symbol with no upstream data.
    pub async fn create_mock_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CRUMB))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = ("modules", "price,summaryDetail,financialData");
        let quarterly = ("modules", "incomeStatementHistoryQuarterly");

        mount_json(
            &server,
            "/v10/finance/quoteSummary/NKE",
            snapshot,
            snapshot_body("USD", 112e9, 75.0, 74.0),
        )
        .await;
        mount_json(
            &server,
            "/v10/finance/quoteSummary/NKE",
            quarterly,
            quarterly_body(&[12e9, 11e9, 12.5e9, 13e9, 14e9]),
        )
        .await;
        mount_json(
            &server,
            "/v8/finance/chart/NKE",
            ("range", "2d"),
            chart_body(&[74.0, 75.0]),
        )
        .await;

        mount_json(
            &server,
            "/v10/finance/quoteSummary/ADS.DE",
            snapshot,
            snapshot_body("EUR", 40e9, 210.0, 200.0),
        )
        .await;
        mount_json(
            &server,
            "/v10/finance/quoteSummary/ADS.DE",
            quarterly,
            quarterly_body(&[6e9, 5e9, 6e9, 5e9]),
        )
        .await;
        // A 150% jump is discarded rather than reported
        mount_json(
            &server,
            "/v8/finance/chart/ADS.DE",
            ("range", "2d"),
            chart_body(&[84.0, 210.0]),
        )
        .await;

        mount_json(
            &server,
            "/v8/finance/chart/EURUSD=X",
            ("range", "5d"),
            chart_body(&[1.05, 1.1]),
        )
        .await;

        server
    }
}

fn write_config(server_uri: &str) -> tempfile::NamedTempFile {
    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_content = format!(
        r#"
        companies:
          - name: "Adidas"
            symbol: "ADS.DE"
          - name: "Missing Co"
            symbol: "GONE"
          - name: "Nike"
            symbol: " $NKE "
        providers:
          yahoo:
            base_url: {server_uri}
            cookie_url: {server_uri}
        policy:
          fetch_delay_ms: 0
        advisories: []
    "#
    );
    fs::write(config_file.path(), &config_content).expect("Failed to write config file");
    config_file
}

#[test_log::test(tokio::test)]
async fn test_report_flow_with_mock() {
    let server = test_utils::create_mock_server().await;
    let config_file = write_config(&server.uri());

    let result = sportstrack::run_command(
        sportstrack::AppCommand::Report { refresh: false },
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Report command failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_pipeline_against_mock_server() {
    let server = test_utils::create_mock_server().await;
    let config_file = write_config(&server.uri());
    let config = sportstrack::core::config::AppConfig::load_from_path(config_file.path()).unwrap();
    let pipeline = sportstrack::build_pipeline(&config).unwrap();

    let report = pipeline.build_report().await;
    info!(?report, "Built report");

    let symbols: Vec<&str> = report.rows.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["NKE", "ADS.DE", "GONE"]);

    let nike = &report.rows[0];
    assert_eq!(nike.native_currency, "USD");
    assert_eq!(nike.market_cap_usd, Some(112e9));
    assert_eq!(nike.revenue_ttm_usd, Some(48.5e9));
    assert_eq!(nike.last_price_native, Some(75.0));
    assert!((nike.daily_pct_change.unwrap() - 1.3513513513).abs() < 1e-6);

    let adidas = &report.rows[1];
    assert_eq!(adidas.native_currency, "EUR");
    assert!((adidas.market_cap_usd.unwrap() - 44e9).abs() < 1.0);
    assert!((adidas.revenue_ttm_usd.unwrap() - 24.2e9).abs() < 1.0);
    assert_eq!(adidas.last_price_native, Some(210.0));
    assert_eq!(adidas.daily_pct_change, None);

    let missing = &report.rows[2];
    assert_eq!(missing.native_currency, "USD");
    assert_eq!(missing.market_cap_usd, None);
    assert_eq!(missing.revenue_ttm_usd, None);
    assert_eq!(missing.last_price_native, None);
    assert_eq!(missing.daily_pct_change, None);
    assert!(report.notes.is_empty());

    // A second read within the TTL is the same cached report
    let again = pipeline.build_report().await;
    assert!(std::sync::Arc::ptr_eq(&report, &again));
}

#[test_log::test(tokio::test)]
async fn test_export_flow_writes_csv_and_xlsx() {
    let server = test_utils::create_mock_server().await;
    let config_file = write_config(&server.uri());
    let out_dir = tempfile::TempDir::new().unwrap();
    let csv_path = out_dir.path().join("sportswear.csv");
    let xlsx_path = out_dir.path().join("sportswear.xlsx");

    sportstrack::run_command(
        sportstrack::AppCommand::Export {
            csv: Some(csv_path.clone()),
            xlsx: Some(xlsx_path.clone()),
            refresh: true,
        },
        Some(config_file.path().to_str().unwrap()),
    )
    .await
    .expect("Export command failed");

    let content = fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("Company,Ticker,Native Currency"));
    assert!(lines[1].starts_with("Nike,NKE,USD,75,112000000000,48500000000,25,"));
    assert!(lines[2].starts_with("Adidas,ADS.DE,EUR,210,"));
    assert!(lines[3].starts_with("Missing Co,GONE,USD,,,,,,"));

    let mut workbook: Xlsx<_> = open_workbook(&xlsx_path).unwrap();
    let range = workbook.worksheet_range("Report").unwrap();
    assert_eq!(range.height(), 4);
    assert_eq!(range.get_value((1, 4)), Some(&Data::Float(112e9)));
    assert_eq!(range.get_value((1, 5)), Some(&Data::Float(48.5e9)));
    assert_eq!(range.get_value((3, 0)), Some(&Data::String("Missing Co".to_string())));
    assert_eq!(range.get_value((3, 4)), Some(&Data::Empty));
}

#[test_log::test(tokio::test)]
async fn test_missing_config_file_fails() {
    let result = sportstrack::run_command(
        sportstrack::AppCommand::Report { refresh: false },
        Some("/nonexistent/sportstrack/config.yaml"),
    )
    .await;
    assert!(result.is_err());
}
