use debughttp_core::{
    mirror_settings, new_default, DumpFlags, HttpTransport, Options, TransportSettings,
    DEFAULT_TRANSPORT,
};
use http::Uri;
use std::sync::Arc;
use std::time::Duration;

fn assert_mirrored(seeded: &TransportSettings, reference: &TransportSettings) {
    match (&seeded.proxy, &reference.proxy) {
        (Some(a), Some(b)) => assert!(Arc::ptr_eq(a, b)),
        (None, None) => {}
        _ => panic!("proxy function not mirrored"),
    }
    match (&seeded.tls_config, &reference.tls_config) {
        (Some(a), Some(b)) => assert!(Arc::ptr_eq(a, b)),
        (None, None) => {}
        _ => panic!("TLS config not mirrored"),
    }
    assert_eq!(seeded.connect_timeout, reference.connect_timeout);
    assert_eq!(seeded.tcp_keepalive, reference.tcp_keepalive);
    assert_eq!(seeded.tcp_nodelay, reference.tcp_nodelay);
    assert_eq!(seeded.happy_eyeballs_timeout, reference.happy_eyeballs_timeout);
    assert_eq!(seeded.tls_handshake_timeout, reference.tls_handshake_timeout);
    assert_eq!(seeded.disable_keep_alives, reference.disable_keep_alives);
    assert_eq!(seeded.max_idle_conns_per_host, reference.max_idle_conns_per_host);
    assert_eq!(seeded.idle_conn_timeout, reference.idle_conn_timeout);
    assert_eq!(seeded.response_header_timeout, reference.response_header_timeout);
    assert_eq!(seeded.http2_only, reference.http2_only);
    assert_eq!(seeded.max_response_header_bytes, reference.max_response_header_bytes);
}

#[tokio::test]
async fn test_new_default_mirrors_default_transport() {
    let transport = new_default(None);
    assert_mirrored(transport.get_ref().settings(), DEFAULT_TRANSPORT.settings());

    // Absent options select the defaults
    assert_eq!(transport.options().flags, DumpFlags::HEADERS);
    assert_eq!(transport.options().auth.len(), 2);
}

#[tokio::test]
async fn test_new_default_keeps_given_options() {
    let transport = new_default(Some(Options::dump_bodies()));
    assert_eq!(transport.options().flags, DumpFlags::BODIES);
}

#[tokio::test]
async fn test_seeded_from_custom_reference() {
    let proxy_target: Uri = "http://proxy.internal:3128".parse().unwrap();
    let reference = HttpTransport::new(TransportSettings {
        proxy: Some(Arc::new(move |_: &Uri| Some(proxy_target.clone()))),
        connect_timeout: Some(Duration::from_secs(5)),
        tcp_keepalive: None,
        tcp_nodelay: false,
        tls_config: None,
        disable_keep_alives: true,
        max_idle_conns_per_host: 7,
        idle_conn_timeout: None,
        response_header_timeout: Some(Duration::from_secs(3)),
        http2_only: true,
        max_response_header_bytes: Some(1024),
        ..Default::default()
    });

    let seeded = HttpTransport::seeded_from(&reference);
    assert_mirrored(seeded.settings(), reference.settings());

    let proxy = seeded.settings().proxy.as_ref().unwrap();
    let target: Uri = "http://example.com/".parse().unwrap();
    assert_eq!(proxy(&target), Some("http://proxy.internal:3128".parse().unwrap()));
}

#[tokio::test]
async fn test_mirror_settings_is_a_copy() {
    let reference = TransportSettings {
        max_idle_conns_per_host: 3,
        ..Default::default()
    };
    let mut mirrored = mirror_settings(&reference);
    mirrored.max_idle_conns_per_host = 50;

    assert_eq!(reference.max_idle_conns_per_host, 3);
    assert_eq!(mirrored.max_idle_conns_per_host, 50);
}
