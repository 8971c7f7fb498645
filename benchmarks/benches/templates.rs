use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use minimus::machinery::compile_program;
use minimus::{context, CompileOptions, Environment};
use serde::Serialize;

const PAGE: &str = include_str!("../inputs/page.mustache");

#[derive(Serialize)]
struct NavItem {
    url: &'static str,
    title: &'static str,
    is_active: bool,
}

fn make_partials() -> BTreeMap<&'static str, &'static str> {
    let mut partials = BTreeMap::new();
    partials.insert("nav_item", include_str!("../inputs/nav_item.mustache"));
    partials
}

fn do_compile() {
    compile_program(black_box(PAGE), &CompileOptions::default()).unwrap();
}

fn do_compile_uncached(env: &Environment) {
    env.compile_with_options(black_box(PAGE), CompileOptions::default().cache(false))
        .unwrap();
}

fn do_render(env: &Environment, partials: &BTreeMap<&'static str, &'static str>) {
    let tmpl = env.compile(PAGE).unwrap();
    tmpl.render(
        context! {
            title => "Benchmark <Page>",
            site => context! {
                nav => vec![
                    NavItem { url: "/", title: "Index", is_active: true },
                    NavItem { url: "/doc", title: "Docs", is_active: false },
                    NavItem { url: "/help", title: "Help", is_active: false },
                ],
                copyright => 2024,
                owner => "<b>Nobody</b>",
            },
            items => (0..200).skip(3).collect::<Vec<_>>(),
        },
        partials,
    )
    .unwrap();
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("compile", |b| b.iter(do_compile));
    c.bench_function("compile_uncached", |b| {
        let env = Environment::new();
        b.iter(|| do_compile_uncached(&env));
    });
    c.bench_function("render", |b| {
        let env = Environment::new();
        let partials = make_partials();
        b.iter(|| do_render(&env, &partials));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
