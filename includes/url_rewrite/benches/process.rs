use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use url_rewrite::{Configuration, RequestCtx};

const RULES: &str = r#"
RewriteCond %{HTTP_USER_AGENT} Android [OR]
RewriteCond %{HTTP_USER_AGENT} iPhone
RewriteRule ^/shop/(.*)$ /mobile/shop/$1 [L]

RewriteRule ^/static/(.*)$ /files/$1
RewriteRule ^/files/(.*)$  /cdn/$1 [QSA]
"#;

pub fn rewrite_match(conf: &Configuration, req: &RequestCtx) {
    let result = conf.process(req);
    assert!(matches!(result, Some(r) if r.target() == "/cdn/hello/world?v=1"));
}

pub fn rewrite_miss(conf: &Configuration, req: &RequestCtx) {
    assert!(conf.process(req).is_none());
}

pub fn bench_chain_match(c: &mut Criterion) {
    let conf = Configuration::from_directives(RULES);
    let req = RequestCtx::new("/static/hello/world?v=1").header("User-Agent", "Firefox");
    c.bench_function("chain_match", |b| {
        b.iter(|| black_box(rewrite_match(black_box(&conf), black_box(&req))))
    });
}

pub fn bench_chain_miss(c: &mut Criterion) {
    let conf = Configuration::from_directives(RULES);
    let req = RequestCtx::new("/index.html").header("User-Agent", "Firefox");
    c.bench_function("chain_miss", |b| {
        b.iter(|| black_box(rewrite_miss(black_box(&conf), black_box(&req))))
    });
}

criterion_group!(benches, bench_chain_match, bench_chain_miss);
criterion_main!(benches);
