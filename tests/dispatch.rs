//! End-to-end dispatch through App, routers, middlewares and the firewall.

use axum::http::{header, Method, StatusCode};
use http_dispatch::config::FirewallConfig;
use http_dispatch::handler;
use http_dispatch::security::FirewallSettings;
use http_dispatch::App;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

mod common;

fn limited_app(max_requests_per_minute: i64, block_timeout_secs: i64) -> Arc<App> {
    let settings = FirewallSettings::from_config(&FirewallConfig {
        max_requests_per_minute,
        block_timeout_secs,
        max_hack_attempts: -1,
    });
    let app = App::with_firewall_settings(Arc::new(settings));
    app.router()
        .get("/ping", handler::from_ctx(|ctx| ctx.write("pong")))
        .unwrap();
    app
}

#[test]
fn test_firewall_rejects_request_over_limit_then_readmits() {
    let app = limited_app(3, 1);
    let peer = "192.0.2.44:5000";

    for _ in 0..3 {
        let ex = app.handle(common::request(Method::GET, "/ping", peer));
        assert_eq!(ex.status(), StatusCode::OK);
    }

    let rejected = app.handle(common::request(Method::GET, "/ping", peer));
    assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(rejected.response_headers()[header::RETRY_AFTER], "1");

    // Other clients are unaffected.
    let other = app.handle(common::request(Method::GET, "/ping", "192.0.2.45:5000"));
    assert_eq!(other.status(), StatusCode::OK);

    thread::sleep(Duration::from_millis(1100));

    let readmitted = app.handle(common::request(Method::GET, "/ping", peer));
    assert_eq!(readmitted.status(), StatusCode::OK);
    assert_eq!(readmitted.response_body(), b"pong");
}

#[test]
fn test_disabled_firewall_never_blocks() {
    for app in [limited_app(-1, 30), limited_app(2, -1)] {
        for _ in 0..200 {
            let ex = app.handle(common::request(Method::GET, "/ping", "192.0.2.50:1"));
            assert_eq!(ex.status(), StatusCode::OK);
        }
        assert!(!app.firewall().is_blocked("192.0.2.50"));
    }
}

#[test]
fn test_threshold_change_applies_to_next_request() {
    let app = limited_app(100, 30);
    let peer = "192.0.2.60:1";

    for _ in 0..10 {
        assert_eq!(app.handle(common::request(Method::GET, "/ping", peer)).status(), StatusCode::OK);
    }

    app.firewall_settings().set_max_req_per_min(10);
    let ex = app.handle(common::request(Method::GET, "/ping", peer));
    assert_eq!(ex.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[test]
fn test_sequential_requests_reuse_one_context() {
    let app = App::new();
    app.router()
        .get(
            "/who",
            handler::from_ctx(|ctx| {
                assert!(ctx.param("id").is_none());
                assert!(!ctx.is_aborted());
                let id = ctx.request_id().to_string();
                ctx.write(id);
            }),
        )
        .unwrap();
    app.router()
        .get("/items/:id", handler::from_ctx(|ctx| ctx.abort()))
        .unwrap();

    let mut seen = Vec::new();
    for uri in ["/items/1", "/who", "/items/2", "/who"] {
        let ex = app.handle(common::get(uri));
        seen.push(String::from_utf8(ex.response_body().to_vec()).unwrap());
    }

    assert_eq!(app.pool().allocated(), 1);
    assert_eq!(app.pool().idle(), 1);
    assert!(!seen[1].is_empty());
    assert_ne!(seen[1], seen[3]);
}

#[test]
fn test_middleware_abort_skips_handler_but_not_after_request() {
    let app = App::new();
    let handler_ran = Arc::new(AtomicBool::new(false));
    let flag = handler_ran.clone();
    app.router()
        .get(
            "/admin",
            handler::from_fn(move || flag.store(true, Ordering::SeqCst)),
        )
        .unwrap();

    app.use_middleware(|ctx| {
        let authorized = ctx
            .exchange()
            .and_then(|ex| ex.header(header::AUTHORIZATION))
            .is_some();
        if !authorized {
            ctx.error("Unauthorized", StatusCode::UNAUTHORIZED);
            ctx.abort();
        }
    });
    app.use_after_request(|ctx| {
        if let Some(ex) = ctx.exchange_mut() {
            ex.set_header(
                header::HeaderName::from_static("x-served-by"),
                header::HeaderValue::from_static("dispatch"),
            );
        }
    });

    let ex = app.handle(common::get("/admin"));

    assert_eq!(ex.status(), StatusCode::UNAUTHORIZED);
    assert!(!handler_ran.load(Ordering::SeqCst));
    assert_eq!(ex.response_headers()["x-served-by"], "dispatch");
}

#[test]
fn test_requests_route_by_host() {
    let app = App::new();
    app.router()
        .get("/", handler::from_ctx(|ctx| ctx.write("default")))
        .unwrap();
    app.domain("api.example.com")
        .get("/", handler::from_ctx(|ctx| ctx.write("api")))
        .unwrap();

    let request = |host: &str| {
        http_dispatch::Exchange::new(
            axum::http::Request::get("/")
                .header(header::HOST, host)
                .body(bytes::Bytes::new())
                .unwrap(),
        )
    };

    assert_eq!(app.handle(request("api.example.com:8080")).response_body(), b"api");
    assert_eq!(app.handle(request("API.example.com")).response_body(), b"api");
    assert_eq!(app.handle(request("other.example.com")).response_body(), b"default");
}

#[test]
fn test_concurrent_registration_sees_whole_middleware_lists() {
    const REGISTRATIONS: usize = 50;
    const IN_FLIGHT: usize = 1_000;

    let app = App::new();
    app.router()
        .get("/trace", handler::from_ctx(|_| {}))
        .unwrap();

    // Every dispatch and the registrar start together.
    let start = Barrier::new(IN_FLIGHT + 1);
    let app = &*app;
    let start = &start;
    thread::scope(|scope| {
        let registrar = scope.spawn(move || {
            start.wait();
            for i in 0..REGISTRATIONS {
                let marker = format!("m{i};");
                app.use_middleware(move |ctx| ctx.write(&marker));
                thread::yield_now();
            }
        });

        let workers: Vec<_> = (0..IN_FLIGHT)
            .map(|_| {
                thread::Builder::new()
                    .stack_size(256 * 1024)
                    .spawn_scoped(scope, move || {
                        start.wait();
                        let ex = app.handle(common::get("/trace"));
                        let body = String::from_utf8(ex.response_body().to_vec()).unwrap();
                        let seen = body.matches(';').count();
                        let expected: String = (0..seen).map(|i| format!("m{i};")).collect();
                        assert_eq!(body, expected);
                    })
                    .unwrap()
            })
            .collect();

        registrar.join().unwrap();
        for worker in workers {
            worker.join().unwrap();
        }
    });

    let ex = app.handle(common::get("/trace"));
    assert_eq!(ex.response_body().iter().filter(|b| **b == b';').count(), REGISTRATIONS);
}
