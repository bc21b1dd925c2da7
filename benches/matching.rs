use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nlpattern::{
    rules::{Rules, RulesOptions},
    tokenizer::{ManualTagger, Tokenizer},
};

const RULES: &str = r#"{
    "rules": [
        {
            "id": "GRAMMAR/NOUN_ADJ",
            "message": "",
            "pattern": [{ "postag": "N", "min": 1, "max": 3 }, { "postag": "Adj" }],
            "find_all": true
        },
        {
            "id": "GRAMMAR/TENSE",
            "message": "Did you mean '{2:VBD}'?",
            "pattern": [{ "text": "yesterday" }, { "lemma": "be", "marker": true }],
            "suggestions": ["{2:VBD}"]
        },
        {
            "id": "PUNCTUATION/UNPAIRED_BRACKET",
            "message": "Unpaired bracket.",
            "pattern": [{
                "text": ")",
                "exceptions": [{ "text": "(", "scope": { "previous": 5 }, "absent": true }]
            }]
        }
    ]
}"#;

const TAGGER: &str = "gato\tgato\tN\nperro\tperro\tN\ncasa\tcasa\tN\nrojo\trojo\tAdj\nis\tbe\tVBZ\nwas\tbe\tVBD";

fn suggest(c: &mut Criterion) {
    let tokenizer = Tokenizer::new(ManualTagger::from_lines(TAGGER.lines()));
    let rules = Rules::from_json(RULES.as_bytes(), RulesOptions::default()).unwrap();
    let text = "Yesterday is gato perro rojo. The casa ) is rojo and the gato casa perro rojo too. "
        .repeat(20);

    c.bench_function("suggest", |b| {
        b.iter(|| rules.suggest(black_box(&text), &tokenizer))
    });
}

fn compile(c: &mut Criterion) {
    c.bench_function("compile rules", |b| {
        b.iter(|| Rules::from_json(black_box(RULES).as_bytes(), RulesOptions::default()).unwrap())
    });
}

criterion_group!(benches, suggest, compile);
criterion_main!(benches);
