//! DOM checks through the HTML-only backend against a local server

#![cfg(feature = "simple")]

use std::sync::{Arc, Once};

use tiny_http::{Response, Server};
use visreg::simple::SimpleBrowser;
use visreg::{run_scenario, run_suite, Error, RunnerConfig, SettleStrategy, Stability, Step, Suite};

static INIT: Once = Once::new();

const DASHBOARD: &str = r#"<!DOCTYPE html>
<html>
<head><title>Tester Demo</title></head>
<body>
  <nav><span class="brand">SaaSy Dashboard</span></nav>
  <main class="grid grid-cols-12">
    <h1>Dashboard Overview</h1>
    <div class="span-3"><p>Total Revenue</p><p>$48,210</p></div>
    <div class="span-3"><p>Active Users</p><p>2,314</p></div>
    <div class="span-3"><p>New Signups</p><p>182</p></div>
    <div class="span-3"><p>Churn Rate</p><p>2.1%</p></div>
    <div class="span-8">Revenue chart</div>
    <div class="span-4">Plan mix</div>
    <table id="activity-table" class="span-12"><tr><td>alice upgraded</td></tr></table>
  </main>
</body>
</html>"#;

/// Start a simple test HTTP server
fn start_test_server() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18090").unwrap();
            for request in server.incoming_requests() {
                let response = match request.url() {
                    "/tester-demo" => Response::from_string(DASHBOARD).with_header(
                        "Content-Type: text/html; charset=utf-8"
                            .parse::<tiny_http::Header>()
                            .unwrap(),
                    ),
                    "/broken-demo" => Response::from_string("<html><body><h1>Oops</h1></body></html>")
                        .with_header("Content-Type: text/html".parse::<tiny_http::Header>().unwrap()),
                    _ => Response::from_string("Not Found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });
        // Give the server time to start
        std::thread::sleep(std::time::Duration::from_millis(100));
    });

    "http://127.0.0.1:18090".to_string()
}

fn check_config(base_url: String) -> RunnerConfig {
    let mut config = RunnerConfig {
        base_url,
        capture: false,
        settle: SettleStrategy::Fixed { ms: 0 },
        assert_timeout_ms: 50,
        assert_poll_ms: 10,
        navigation_timeout_ms: 5000,
        ..Default::default()
    };
    config.network_idle.stability = Stability { window_ms: 10, poll_ms: 2, timeout_ms: 1000 };
    config
}

#[test]
fn dashboard_checks_pass_over_http() {
    let config = check_config(start_test_server());
    let browser = SimpleBrowser::new(&config);
    let dashboard = Suite::tester_demo().scenarios.remove(0);

    let report = run_scenario(&browser, &config, &dashboard).expect("dashboard checks");
    assert_eq!(report.expectations_checked, 8);
    assert!(report.artifacts.is_empty());
}

#[test]
fn missing_route_is_a_navigation_error() {
    let config = check_config(start_test_server());
    let browser = SimpleBrowser::new(&config);
    let mut dashboard = Suite::tester_demo().scenarios.remove(0);
    dashboard.route = "/no-such-page".to_string();

    let err = run_scenario(&browser, &config, &dashboard).unwrap_err();
    assert_eq!(err.step(), Some(&Step::Navigate));
    match err.root() {
        Error::NavigationError { reason, .. } => assert!(reason.contains("404")),
        other => panic!("expected navigation error, got {:?}", other),
    }
}

#[test]
fn unreachable_server_is_a_navigation_error() {
    // Nothing listens on the discard port.
    let config = check_config("http://127.0.0.1:9".to_string());
    let browser = SimpleBrowser::new(&config);
    let mobile = Suite::tester_demo().scenarios.remove(1);

    let err = run_scenario(&browser, &config, &mobile).unwrap_err();
    assert!(matches!(err.root(), Error::NavigationError { .. } | Error::Timeout { .. }));
}

#[test]
fn broken_page_fails_the_heading_check() {
    let config = check_config(start_test_server());
    let browser = SimpleBrowser::new(&config);
    let mut dashboard = Suite::tester_demo().scenarios.remove(0);
    dashboard.route = "/broken-demo".to_string();

    let err = run_scenario(&browser, &config, &dashboard).unwrap_err();
    match err.root() {
        Error::AssertionFailed(msg) => assert!(msg.contains("Oops")),
        other => panic!("expected assertion failure, got {:?}", other),
    }
}

#[test]
fn screenshots_need_a_real_browser() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = check_config(start_test_server());
    config.capture = true;
    config.output_dir = dir.path().to_path_buf();
    let browser = SimpleBrowser::new(&config);
    let tablet = Suite::tester_demo().scenarios.remove(2);

    let err = run_scenario(&browser, &config, &tablet).unwrap_err();
    assert_eq!(err.step(), Some(&Step::Capture("tester-demo-tablet.png".into())));
    assert!(matches!(err.root(), Error::Unsupported(_)));
    assert!(!dir.path().join("tester-demo-tablet.png").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn check_mode_suite_passes() {
    let config = check_config(start_test_server());
    let browser = Arc::new(SimpleBrowser::new(&config));

    let report = run_suite(browser, Arc::new(config), &Suite::tester_demo()).await.unwrap();
    assert!(report.success(), "{:?}", report.results);
    assert_eq!(report.passed, 3);
}
