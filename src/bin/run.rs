use clap::{Parser, Subcommand};
use fs_err::File;
use nlpattern::{
    rule::Disambiguator,
    rules::{Rules, RulesOptions},
    tokenizer::{ManualTagger, Tokenizer},
    Error,
};
use std::io::{BufReader, BufWriter};

#[derive(Parser)]
#[clap(version, author, about)]
struct Opts {
    /// Rule file in JSON format.
    #[clap(long, short)]
    rules: String,
    /// Tagger dictionary with `word<TAB>lemma<TAB>tag` lines.
    #[clap(long, short)]
    tagger: Option<String>,
    /// Disambiguation rules in JSON format.
    #[clap(long, short)]
    disambiguation: Option<String>,
    /// Fail if any rule can not be compiled instead of skipping it.
    #[clap(long)]
    strict: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prints the suggestions for a text.
    Check {
        text: String,
        /// Also apply document rules.
        #[clap(long)]
        document: bool,
    },
    /// Prints the corrected text.
    Correct { text: String },
    /// Checks the examples of all rules.
    Test,
    /// Writes the compiled rules as binary.
    Compile { out: String },
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let opts = Opts::parse();

    let tagger = match &opts.tagger {
        Some(path) => ManualTagger::new(path)?,
        None => ManualTagger::default(),
    };
    let mut tokenizer = Tokenizer::new(tagger);
    if let Some(path) = &opts.disambiguation {
        tokenizer =
            tokenizer.with_disambiguator(Disambiguator::from_json(BufReader::new(File::open(path)?))?);
    }

    let rules = Rules::from_json(
        BufReader::new(File::open(&opts.rules)?),
        RulesOptions {
            allow_errors: !opts.strict,
            ..RulesOptions::default()
        },
    )?;

    match opts.command {
        Command::Check { text, document } => {
            let suggestions = if document {
                rules.check_document(&text, &tokenizer)
            } else {
                rules.suggest(&text, &tokenizer)
            };
            println!("{:#?}", suggestions);
        }
        Command::Correct { text } => println!("{}", rules.correct(&text, &tokenizer)),
        Command::Test => rules.test(&tokenizer)?,
        Command::Compile { out } => rules.to_writer(BufWriter::new(File::create(out)?))?,
    }

    Ok(())
}
