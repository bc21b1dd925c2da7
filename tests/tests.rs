use std::convert::TryFrom;

use lazy_static::lazy_static;
use nlpattern::{
    compile::RuleSpec,
    rule::{
        engine::{
            composition::{
                concrete::{TextAtom, WordDataAtom},
                Composition, Matcher, Part, PosMatcher, Quantifier, SerializeRegex,
                WordDataMatcher,
            },
            Engine,
        },
        grammar::Synthesizer,
        id::{RuleId, Selector},
        Rule,
    },
    rules::RulesOptions,
    tokenizer::ManualTagger,
    types::Suggestion,
    Error, Rules, Tokenizer,
};
use quickcheck_macros::quickcheck;

const TAGGER: &str = "gato\tgato\tN
perro\tperro\tN
casa\tcasa\tN
rojo\trojo\tAdj
is\tbe\tVBZ
was\tbe\tVBD
were\tbe\tVBD
realise\trealise\tVB
realize\trealize\tVB";

lazy_static! {
    static ref TOKENIZER: Tokenizer = Tokenizer::new(ManualTagger::from_lines(TAGGER.lines()));
}

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn rules(json: &str) -> Rules {
    Rules::from_json(json.as_bytes(), RulesOptions::default()).unwrap()
}

fn rule(json: &str) -> Rule {
    let spec: RuleSpec = serde_json::from_str(json).unwrap();
    Rule::try_from(spec).unwrap()
}

fn spans(suggestions: &[Suggestion]) -> Vec<(usize, usize)> {
    suggestions.iter().map(|x| (x.start, x.end)).collect()
}

#[test]
fn can_analyze_empty_text() {
    assert!(TOKENIZER.analyze("").is_empty());
    assert!(Rules::default().suggest("", &*TOKENIZER).is_empty());
}

#[quickcheck]
fn filtered_view_keeps_order(text: String) -> bool {
    TOKENIZER.analyze(&text).iter().all(|sentence| {
        let view = sentence.filtered_view();
        let full = sentence.tokens();

        let expected: Vec<_> = full
            .iter()
            .filter(|x| !x.is_whitespace() || x.is_sentence_boundary())
            .collect();

        view.mapping().windows(2).all(|x| x[0] < x[1])
            && view.len() == expected.len()
            && view
                .tokens()
                .iter()
                .zip(view.mapping())
                .zip(expected)
                .all(|((token, i), expected)| {
                    std::ptr::eq(*token, &full[*i]) && std::ptr::eq(*token, expected)
                })
    })
}

#[test]
fn rules_can_be_built_in_memory() -> Result<(), Error> {
    let verb = Part::new(
        WordDataAtom::new(WordDataMatcher::new(
            Some(PosMatcher::new(Matcher::regex("VB.", true, false)?)),
            None,
        ))
        .into(),
        Quantifier::once(),
        false,
    );
    let noun = Part::new(
        TextAtom::new(Matcher::new_regex(
            SerializeRegex::new("GATO|perro", false, true).unwrap(),
            false,
            true,
        ))
        .into(),
        Quantifier::once(),
        true,
    );

    let rule = Rule::new(
        RuleId::try_from("GRAMMAR/VERB_NOUN")?,
        Engine::new(Composition::new(vec![verb, noun])?, Vec::new()),
        Synthesizer::parse("Noun after '\\1'.", 2, false)?,
        vec![Synthesizer::parse("{2}s", 2, true)?],
    );

    let suggestions = rule.apply(&TOKENIZER.analyze("It was gato.")[0], &*TOKENIZER)?;
    assert_eq!(spans(&suggestions), vec![(7, 11)]);
    assert_eq!(suggestions[0].message, "Noun after 'was'.");
    assert_eq!(suggestions[0].replacements, vec!["gatos"]);

    assert!(rule
        .apply(&TOKENIZER.analyze("The gato.")[0], &*TOKENIZER)?
        .is_empty());
    assert!(matches!(
        Matcher::regex("(VB", true, false),
        Err(Error::MalformedPattern(_))
    ));
    Ok(())
}

#[test]
fn quantifiers_are_greedy() {
    init();
    let rule = rule(
        r#"{
            "id": "GRAMMAR/NOUN_ADJ",
            "message": "",
            "pattern": [
                { "postag": "N", "min": 1, "max": 3 },
                { "postag": "Adj" }
            ]
        }"#,
    );

    let sentence = &TOKENIZER.analyze("gato perro casa rojo")[0];
    let suggestions = rule.apply(sentence, &*TOKENIZER).unwrap();

    assert_eq!(spans(&suggestions), vec![(0, 20)]);
}

#[test]
fn quantifiers_give_back_tokens() {
    let rule = rule(
        r#"{
            "id": "GRAMMAR/NOUNS",
            "message": "",
            "pattern": [
                { "postag": "N", "min": 1, "max": 3 },
                { "postag": "N" }
            ],
            "suggestions": ["\\1/\\2"]
        }"#,
    );

    let sentence = &TOKENIZER.analyze("gato perro casa")[0];
    let suggestions = rule.apply(sentence, &*TOKENIZER).unwrap();

    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].replacements, vec!["gato perro/casa"]);
}

#[test]
fn exception_vetoes_match() {
    let rule = rule(
        r#"{
            "id": "PUNCTUATION/UNPAIRED_BRACKET",
            "message": "Unpaired bracket.",
            "pattern": [{
                "text": ")",
                "exceptions": [{ "text": "(", "scope": { "previous": 5 }, "absent": true }]
            }]
        }"#,
    );

    let apply = |text: &str| rule.apply(&TOKENIZER.analyze(text)[0], &*TOKENIZER).unwrap();

    assert!(apply("a ) b").is_empty());
    assert_eq!(spans(&apply("( a ) b")), vec![(4, 5)]);
}

#[test]
fn back_reference_in_suggestion() {
    let rule = rule(
        r#"{
            "id": "GRAMMAR/FORM",
            "message": "",
            "pattern": [{ "postag": "N.*", "postag_regexp": true }],
            "suggestions": ["{1}-form"]
        }"#,
    );

    let sentence = &TOKENIZER.analyze("casa")[0];
    let suggestions = rule.apply(sentence, &*TOKENIZER).unwrap();

    assert_eq!(suggestions[0].replacements, vec!["casa-form"]);
}

#[test]
fn inflection_fans_out_in_provider_order() {
    let rule = rule(
        r#"{
            "id": "GRAMMAR/TENSE",
            "message": "Use the past tense.",
            "pattern": [{ "lemma": "be" }],
            "suggestions": ["{1:VBD}", "{1:VBN}", "{1:VBZ} not"]
        }"#,
    );

    let sentence = &TOKENIZER.analyze("It is here.")[0];
    let suggestions = rule.apply(sentence, &*TOKENIZER).unwrap();

    assert_eq!(suggestions.len(), 1);
    assert_eq!(
        suggestions[0].replacements,
        vec!["was", "were", "is not"]
    );
}

#[test]
fn bitext_rules() {
    let rules = rules(
        r#"{
            "bitext_rules": [{
                "id": "TRANSLATION/ABSURD",
                "source": { "id": "SOURCE/ABSURD", "message": "", "pattern": [{ "text": "absurd" }] },
                "target": {
                    "id": "TARGET/ABSURD",
                    "message": "'absurd' is probably not a correct translation.",
                    "pattern": [{ "text": "absurd" }]
                }
            }]
        }"#,
    );

    let check = |source: &str, target: &str| {
        rules.apply_bitext(
            &TOKENIZER.analyze_sentence(source, 0),
            &TOKENIZER.analyze_sentence(target, 0),
            &*TOKENIZER,
        )
    };

    let suggestions = check("This is an ABSURD.", "To absurd.");
    assert_eq!(spans(&suggestions), vec![(3, 9)]);
    assert_eq!(suggestions[0].source, "TRANSLATION/ABSURD");
    assert_eq!(suggestions[0].source_context, Some((11, 17)));

    assert!(check("This is an absurd.", "Eso es ridículo.").is_empty());
}

#[test]
fn bitext_rules_flag_missing_translations() {
    let rules = rules(
        r#"{
            "bitext_rules": [{
                "id": "TRANSLATION/GIFT",
                "policy": "source_only",
                "source": { "id": "SOURCE/GIFT", "message": "'gift' should be translated as 'regalo'.", "pattern": [{ "text": "gift" }] },
                "target": { "id": "TARGET/REGALO", "message": "", "pattern": [{ "text": "regalo" }] }
            }]
        }"#,
    );

    let check = |source: &str, target: &str| {
        rules.apply_bitext(
            &TOKENIZER.analyze_sentence(source, 0),
            &TOKENIZER.analyze_sentence(target, 0),
            &*TOKENIZER,
        )
    };

    let suggestions = check("This is a gift.", "Es un obsequio.");
    assert_eq!(spans(&suggestions), vec![(0, 15)]);
    assert_eq!(suggestions[0].source, "TRANSLATION/GIFT");
    assert_eq!(suggestions[0].message, "'gift' should be translated as 'regalo'.");
    assert!(suggestions[0].replacements.is_empty());
    assert_eq!(suggestions[0].source_context, Some((10, 14)));

    assert!(check("This is a gift.", "Es un regalo.").is_empty());
    assert!(check("This is a book.", "Es un obsequio.").is_empty());
}

#[test]
fn matching_is_idempotent() {
    let rules = rules(
        r#"{
            "rules": [
                { "id": "GRAMMAR/NOUNS", "message": "", "pattern": [{ "postag": "N", "max": null }], "find_all": true },
                { "id": "GRAMMAR/BE", "message": "", "pattern": [{ "lemma": "be" }], "suggestions": ["{1:VBD}"] }
            ]
        }"#,
    );
    let text = "gato is perro. casa was rojo gato gato. It is.";
    let expected = rules.suggest(text, &*TOKENIZER);
    assert!(!expected.is_empty());

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| rules.suggest(text, &*TOKENIZER)))
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });

    assert_eq!(rules.suggest(text, &*TOKENIZER), expected);
}

#[test]
fn runaway_pattern_exceeds_budget() {
    init();
    let rules = Rules::from_json(
        r#"{
            "rules": [
                {
                    "id": "GRAMMAR/RUNAWAY",
                    "message": "",
                    "step_budget": 200,
                    "pattern": [
                        { "regexp": true, "text": ".+", "max": null },
                        { "regexp": true, "text": ".+", "max": null },
                        { "text": "never" }
                    ]
                },
                { "id": "TYPOS/TEH", "message": "", "pattern": [{ "text": "teh" }], "suggestions": ["the"] }
            ]
        }"#
        .as_bytes(),
        RulesOptions::default(),
    )
    .unwrap();

    let text = "teh a b c d e f g h i j k l m n o p q r s t u v w x y z";
    let sentence = &TOKENIZER.analyze(text)[0];

    assert!(matches!(
        rules.rules()[0].apply(sentence, &*TOKENIZER),
        Err(Error::PatternTooComplex { budget: 200, .. })
    ));
    assert_eq!(
        rules.correct(text, &*TOKENIZER),
        "the a b c d e f g h i j k l m n o p q r s t u v w x y z"
    );
}

#[test]
fn find_all_and_leftmost() {
    let json = |find_all: bool| {
        format!(
            r#"{{ "rules": [{{ "id": "A/B", "message": "", "pattern": [{{ "text": "x" }}], "find_all": {} }}] }}"#,
            find_all
        )
    };

    let text = "x y x y x";
    assert_eq!(spans(&rules(&json(false)).suggest(text, &*TOKENIZER)), vec![(0, 1)]);
    assert_eq!(
        spans(&rules(&json(true)).suggest(text, &*TOKENIZER)),
        vec![(0, 1), (4, 5), (8, 9)]
    );
}

#[test]
fn rules_survive_serialization() -> Result<(), Error> {
    let mut rules = rules(
        r#"{
            "rules": [
                { "id": "TYPOS/TEH", "message": "Typo.", "pattern": [{ "text": "teh" }], "suggestions": ["the"] },
                { "id": "STYLE/GATO", "message": "", "pattern": [{ "regexp": true, "text": "GATO", "case_sensitive": false }], "suggestions": ["cat"] }
            ]
        }"#,
    );
    rules.disable(&Selector::try_from("STYLE")?);

    let mut bytes = Vec::new();
    rules.to_writer(&mut bytes)?;
    let loaded = Rules::from_reader(&bytes[..])?;

    let text = "Teh gato is here.";
    assert_eq!(loaded.correct(text, &*TOKENIZER), "The gato is here.");
    assert_eq!(
        loaded.suggest(text, &*TOKENIZER),
        rules.suggest(text, &*TOKENIZER)
    );
    Ok(())
}

#[test]
fn document_rules_are_scoped_to_one_check() {
    let rules = rules(
        r#"{
            "document_rules": [
                { "type": "word_coherency", "id": "STYLE/COHERENCY", "pairs": [["realise", "realize"]] }
            ]
        }"#,
    );

    let suggestions = rules.check_document("We realise it. They realize it.", &*TOKENIZER);
    assert_eq!(spans(&suggestions), vec![(20, 27)]);
    assert_eq!(suggestions[0].replacements, vec!["realise"]);

    assert!(rules
        .check_document("They realize it.", &*TOKENIZER)
        .is_empty());
}

#[test]
fn rule_examples_pass() {
    init();
    let rules = rules(
        r#"{
            "rules": [{
                "id": "GRAMMAR/BE",
                "message": "Did you mean '{2:VBD}'?",
                "pattern": [{ "text": "yesterday" }, { "lemma": "be", "postag": "VBZ", "marker": true }],
                "suggestions": ["{2:VBD}"],
                "examples": [
                    { "text": "Yesterday <marker>is</marker> fine.", "correction": "was|were" },
                    { "text": "Today is fine." }
                ]
            }]
        }"#,
    );

    assert!(rules.test(&*TOKENIZER).is_ok());
}
