//! Performance benchmarks for sitestore
//!
//! Tracks the cost of parsing and serializing configuration documents and
//! of the site codec, at configuration sizes a busy client accumulates.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sitestore::{codec, Document, Element, LogonType, Password, Site, SiteStore};
use std::hint::black_box;
use std::time::Duration;
use tempfile::TempDir;

fn fixture_site(i: usize) -> Site {
    let mut site = Site::new(format!("ftp{i}.example.com"), 21);
    site.set_name(&format!("Site {i}"));
    site.credentials.set_logon_type(LogonType::Normal);
    site.credentials.user = format!("user{i}");
    site.credentials.password = Some(Password::Plain(format!("password-{i}")));
    site.post_login_commands = vec!["SITE UMASK 002".to_string()];
    site.set_extra_parameter("Color", "blue");
    site
}

fn fixture_document(site_count: usize) -> Document {
    let mut document = Document::new();
    let root = document.ensure_root("SiteStore");
    let servers = root.add_child(Element::new("Servers"));
    for i in 0..site_count {
        servers.add_child(codec::encode(&fixture_site(i), Element::new("Server")));
    }
    document
}

/// Benchmark document parsing with varying site counts
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_parse");
    group.measurement_time(Duration::from_secs(2));

    for site_count in [10, 100, 1000].iter() {
        let bytes = fixture_document(*site_count).to_bytes();
        group.bench_with_input(
            BenchmarkId::from_parameter(site_count),
            &bytes,
            |b, bytes| {
                b.iter(|| {
                    let document = Document::parse(bytes).unwrap();
                    black_box(document);
                });
            },
        );
    }
    group.finish();
}

/// Benchmark document serialization with varying site counts
fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_serialize");
    group.measurement_time(Duration::from_secs(2));

    for site_count in [10, 100, 1000].iter() {
        let document = fixture_document(*site_count);
        group.bench_with_input(
            BenchmarkId::from_parameter(site_count),
            &document,
            |b, document| {
                b.iter(|| {
                    black_box(document.to_bytes());
                });
            },
        );
    }
    group.finish();
}

/// Benchmark the site codec in both directions
fn bench_codec(c: &mut Criterion) {
    let site = fixture_site(0);
    let node = codec::encode(&site, Element::new("Server"));

    c.bench_function("codec_encode", |b| {
        b.iter(|| {
            black_box(codec::encode(&site, Element::new("Server")));
        });
    });

    c.bench_function("codec_decode", |b| {
        b.iter(|| {
            black_box(codec::decode(&node).unwrap());
        });
    });
}

/// Benchmark a full save/load cycle through the store
fn bench_save_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_save_load");
    group.measurement_time(Duration::from_secs(3));
    group.sample_size(20);

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sites.xml");

    let mut store = SiteStore::new(&path);
    store.load(false).unwrap();
    let fixture = fixture_document(100);
    let bytes = fixture.to_bytes();
    store.parse_data(&bytes).unwrap();

    group.bench_function("save_100_sites", |b| {
        b.iter(|| {
            store.save().unwrap();
        });
    });

    group.bench_function("load_100_sites", |b| {
        b.iter(|| {
            let mut reader = SiteStore::new(&path);
            reader.load(false).unwrap();
            black_box(reader.root().map(|r| r.is_empty()));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_serialize, bench_codec, bench_save_load);
criterion_main!(benches);
