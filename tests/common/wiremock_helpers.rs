use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_CONTENT_TYPE: &str = "application/vnd.ms-excel";

/// Path component of a report href produced by `fixtures::report_href`.
pub fn report_path(date_prefix: &str) -> String {
    report_path_with_extension(date_prefix, "xlsx")
}

pub fn report_path_with_extension(date_prefix: &str, extension: &str) -> String {
    format!("/files/grdw/{}_NLDC_PSP.{}", date_prefix, extension)
}

/// Serves `body` as a spreadsheet download at the report path for `date_prefix`.
pub async fn mount_report(server: &MockServer, date_prefix: &str, body: Vec<u8>) {
    mount_report_with_extension(server, date_prefix, "xlsx", body).await;
}

/// Like `mount_report`, for a file published as `.<extension>`.
pub async fn mount_report_with_extension(server: &MockServer, date_prefix: &str, extension: &str, body: Vec<u8>) {
    let content_type = if extension == "xls" { XLS_CONTENT_TYPE } else { XLSX_CONTENT_TYPE };
    Mock::given(method("GET"))
        .and(path(report_path_with_extension(date_prefix, extension)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body)
                .insert_header("content-type", content_type),
        )
        .mount(server)
        .await;
}

/// Answers the report path for `date_prefix` with `status` and no body.
pub async fn mount_status(server: &MockServer, date_prefix: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(report_path(date_prefix)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Starts a server hosting one valid report per date prefix.
pub async fn mock_report_server(date_prefixes: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    for (i, prefix) in date_prefixes.iter().enumerate() {
        mount_report(&server, prefix, super::fixtures::report_xlsx(1000.0 * (i as f64 + 1.0))).await;
    }
    server
}
