use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pagedeploy_core::DeployConfig;

fn bench_config_parse(c: &mut Criterion) {
    let toml_text = r#"
format_override = "es"

[[targets]]
name = "app"
inputs = ["src/main.js", "src/stores.js"]

[[targets.output]]
format = "iife"
file = "public/build/bundle.js"

[[targets.output]]
format = "umd"
file = "dist/app.umd.js"
banner = "/* app */"

[publish]
dir = "public"
branch = "gh-pages"
message = "Deploy"
"#;

    c.bench_function("parse_config", |b| {
        b.iter(|| {
            let _cfg =
                DeployConfig::from_toml_str(black_box(toml_text), Path::new("deploy.toml"), None)
                    .unwrap();
        })
    });
}

criterion_group!(benches, bench_config_parse);
criterion_main!(benches);
