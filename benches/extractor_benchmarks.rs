// benches/extractor_benchmarks.rs
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use export_synth::extractor::DeclarationExtractor;

const MANIFEST_SMALL: &str = r#"
pub mod field;
pub mod form;

pub use field::*;
pub use form::{patch_form_question, FormId as Id};
"#;

const UNIT_MEDIUM: &str = r##"
//! Field table access.
use std::collections::HashMap;

/// A field row.
#[derive(Debug, Clone)]
pub struct Field {
    pub id: u32,
    pub name: String,
}

pub enum Kind { Text, Number, Choice(Vec<String>) }

pub trait Store {
    fn get(&self, id: u32) -> Option<Field>;
}

pub const MAX_FIELDS: usize = 512;
pub static mut COUNTER: u64 = 0;
pub type FieldMap = HashMap<u32, Field>;

/* pub fn commented_out() {} /* nested */ */
pub fn create_field(name: &str) -> Field {
    let note = "pub fn not_a_declaration() {}";
    let raw = r#"pub struct AlsoNot;"#;
    let _ = (note, raw, 'x', '\'');
    Field { id: 0, name: name.to_string() }
}

impl Field {
    pub fn list_field(map: &FieldMap) -> Vec<&Field> {
        map.values().collect()
    }
}

pub(crate) fn internal() {}
pub unsafe extern "C" fn exported_symbol() {}
"##;

fn generate_unit(items: usize) -> String {
    let mut unit = String::new();
    for i in 0..items {
        unit.push_str(&format!("/// Item {i}\npub fn item_{i}(x: u32) -> u32 {{ x + {i} }}\n"));
        unit.push_str(&format!("pub struct Row{i} {{ pub value: [u8; {i}] }}\n"));
        if i % 10 == 0 {
            unit.push_str(&format!("pub use self::item_{i} as alias_{i};\n"));
        }
    }
    unit
}

fn benchmark_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_declarations");
    let large = generate_unit(500);

    group.bench_function("small_manifest", |b| {
        b.iter(|| DeclarationExtractor::extract_from_file("mod.rs", black_box(MANIFEST_SMALL)))
    });
    group.bench_function("medium_unit", |b| {
        b.iter(|| DeclarationExtractor::extract_from_file("field.rs", black_box(UNIT_MEDIUM)))
    });
    group.bench_function("large_generated_unit", |b| {
        b.iter(|| DeclarationExtractor::extract_from_file("large.rs", black_box(&large)))
    });
    group.finish();
}

criterion_group!(benches, benchmark_extract);
criterion_main!(benches);
