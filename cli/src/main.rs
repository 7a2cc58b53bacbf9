#![allow(clippy::print_stdout, clippy::print_stderr)]

use anyhow::Context;
use clap::{Parser, Subcommand, ValueHint};
use oxiri::Iri;
use oxldt::{BoundCall, QueryBuilder, Skolemizer, TemplateCall, TemplateRegistry, UpdateBuilder};
use oxrdf::Graph;
use oxttl::{TurtleParser, TurtleSerializer};
use std::fs;
use std::io::{self, stdin};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::{Position, Url};

#[derive(Parser)]
#[command(about, version, name = "oxldt")]
/// Oxldt command line tool: resolve Linked Data requests into SPARQL.
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the template class a request URL resolves to.
    Match {
        /// Turtle file declaring the application's templates.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        ontology: PathBuf,
        /// Base IRI the application is served under.
        ///
        /// Defaults to the scheme and authority of the request URL.
        #[arg(short, long)]
        base: Option<String>,
        /// Request URL to resolve.
        url: String,
    },
    /// Print the state URI identifying a request.
    State {
        /// Turtle file declaring the application's templates.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        ontology: PathBuf,
        /// Base IRI the application is served under.
        ///
        /// Defaults to the scheme and authority of the request URL.
        #[arg(short, long)]
        base: Option<String>,
        /// Request URL to resolve.
        url: String,
    },
    /// Print the SPARQL query answering a request.
    Query {
        /// Turtle file declaring the application's templates.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        ontology: PathBuf,
        /// Base IRI the application is served under.
        ///
        /// Defaults to the scheme and authority of the request URL.
        #[arg(short, long)]
        base: Option<String>,
        /// Request URL to resolve.
        url: String,
    },
    /// Print the SPARQL update applying a request.
    Update {
        /// Turtle file declaring the application's templates.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        ontology: PathBuf,
        /// Base IRI the application is served under.
        ///
        /// Defaults to the scheme and authority of the request URL.
        #[arg(short, long)]
        base: Option<String>,
        /// Request URL to resolve.
        url: String,
    },
    /// Replace blank nodes in a Turtle document with URIs minted from templates.
    Skolemize {
        /// Turtle file declaring the application's templates.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        ontology: PathBuf,
        /// Base IRI to mint resource URIs under.
        #[arg(short, long)]
        base: String,
        /// Turtle file to skolemize, read from standard input when absent.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },
}

pub fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();
    match Args::parse().command {
        Command::Match {
            ontology,
            base,
            url,
        } => {
            let url = Url::parse(&url).with_context(|| format!("invalid request URL {url}"))?;
            let base = request_base(base.as_deref(), &url);
            let registry = TemplateRegistry::from_graph(&load_graph(&ontology, &base)?, &base)?;
            let matched = registry.match_path(url.path())?;
            println!("{}", matched.template().class().as_str());
            for (name, value) in matched.captures().iter() {
                println!("{name} {value}");
            }
            Ok(())
        }
        Command::State {
            ontology,
            base,
            url,
        } => {
            let bound = resolve(&ontology, base.as_deref(), &url)?;
            println!("{}", bound.state().as_str());
            if let Some(previous) = bound.previous_page()? {
                println!("prev {}", previous.state().as_str());
            }
            if let Some(next) = bound.next_page()? {
                println!("next {}", next.state().as_str());
            }
            Ok(())
        }
        Command::Query {
            ontology,
            base,
            url,
        } => {
            let bound = resolve(&ontology, base.as_deref(), &url)?;
            println!("{}", QueryBuilder::new(&bound).build()?);
            Ok(())
        }
        Command::Update {
            ontology,
            base,
            url,
        } => {
            let bound = resolve(&ontology, base.as_deref(), &url)?;
            println!("{}", UpdateBuilder::new(&bound).build()?);
            Ok(())
        }
        Command::Skolemize {
            ontology,
            base,
            file,
        } => skolemize(&ontology, &base, file.as_deref()),
    }
}

fn request_base(base: Option<&str>, url: &Url) -> String {
    match base {
        Some(base) => base.to_owned(),
        None => format!("{}/", &url[..Position::BeforePath]),
    }
}

fn resolve(ontology: &Path, base: Option<&str>, url: &str) -> anyhow::Result<BoundCall> {
    let url = Url::parse(url).with_context(|| format!("invalid request URL {url}"))?;
    let base = request_base(base, &url);
    let registry = Arc::new(TemplateRegistry::from_graph(
        &load_graph(ontology, &base)?,
        &base,
    )?);
    debug!(templates = registry.len(), "loaded template registry");
    let matched = registry.match_path(url.path())?;
    debug!(
        template = matched.template().class().as_str(),
        "matched request path"
    );
    let call = TemplateCall::new(
        Arc::clone(&registry),
        matched.template().class(),
        Iri::parse(base).context("invalid base IRI")?,
        matched.captures().clone(),
    )?;
    Ok(call
        .apply_arguments(url.query_pairs())?
        .apply_defaults()
        .build()?)
}

fn skolemize(ontology: &Path, base: &str, file: Option<&Path>) -> anyhow::Result<()> {
    let registry = TemplateRegistry::from_graph(&load_graph(ontology, base)?, base)?;
    let data = match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => io::read_to_string(stdin())?,
    };
    let mut payload = Graph::new();
    for triple in turtle_parser(base)?.for_reader(data.as_bytes()) {
        payload.insert(&triple?);
    }
    let base = Iri::parse(base.to_owned()).context("invalid base IRI")?;
    let minted = Skolemizer::new(&registry, base).skolemize(&payload)?;
    debug!(triples = minted.len(), "skolemized payload");
    let mut writer = TurtleSerializer::new().for_writer(io::stdout().lock());
    for triple in minted.iter() {
        writer.serialize_triple(triple)?;
    }
    writer.finish()?;
    Ok(())
}

fn load_graph(path: &Path, base: &str) -> anyhow::Result<Graph> {
    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut graph = Graph::new();
    for triple in turtle_parser(base)?.for_reader(data.as_bytes()) {
        graph.insert(&triple?);
    }
    Ok(graph)
}

fn turtle_parser(base: &str) -> anyhow::Result<TurtleParser> {
    TurtleParser::new()
        .with_base_iri(base)
        .with_context(|| format!("invalid base IRI {base}"))
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use assert_cmd::Command;
    use assert_fs::prelude::*;
    use assert_fs::NamedTempFile;
    use predicates::prelude::*;

    const ONTOLOGY: &str = r#"
        @prefix ldt: <https://www.w3.org/ns/ldt#> .
        @prefix sp: <http://spinrdf.org/sp#> .
        @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
        @prefix ex: <https://example.com/ns#> .

        ex:Item a ldt:Template ;
            ldt:match "/items/{id}" ;
            ldt:query [ sp:text "DESCRIBE ?this" ] ;
            ldt:update [ sp:text "DELETE { ?this ?p ?o } WHERE { ?this ?p ?o }" ] ;
            ldt:param [ ldt:predicate ex:id ] .

        ex:ItemContainer a ldt:ContainerTemplate ;
            ldt:match "/items" ;
            ldt:query [ sp:text "DESCRIBE ?this ?item WHERE { { SELECT ?item WHERE { ?item <https://example.com/ns#inContainer> ?this } ORDER BY ?item LIMIT 20 } }" ] ;
            ldt:param [ ldt:predicate ex:limit ; ldt:valueType xsd:integer ; ldt:optional true ] ,
                      [ ldt:predicate ex:offset ; ldt:valueType xsd:integer ; ldt:optional true ] .
    "#;

    fn cli_command() -> Result<Command> {
        Ok(Command::cargo_bin("oxldt")?)
    }

    fn ontology_file() -> Result<NamedTempFile> {
        let file = NamedTempFile::new("app.ttl")?;
        file.write_str(ONTOLOGY)?;
        Ok(file)
    }

    #[test]
    fn cli_match_prints_the_template_and_captures() -> Result<()> {
        let ontology = ontology_file()?;
        cli_command()?
            .arg("match")
            .arg("--ontology")
            .arg(ontology.path())
            .arg("https://example.com/items/42")
            .assert()
            .success()
            .stdout("https://example.com/ns#Item\nid 42\n");
        Ok(())
    }

    #[test]
    fn cli_state_appends_query_arguments_and_page_links() -> Result<()> {
        let ontology = ontology_file()?;
        cli_command()?
            .arg("state")
            .arg("--ontology")
            .arg(ontology.path())
            .arg("https://example.com/items?offset=20&limit=10")
            .assert()
            .success()
            .stdout(
                "https://example.com/items?limit=10&offset=20\n\
                 prev https://example.com/items?limit=10&offset=10\n\
                 next https://example.com/items?limit=10&offset=30\n",
            );
        Ok(())
    }

    #[test]
    fn cli_state_of_a_document_has_no_page_links() -> Result<()> {
        let ontology = ontology_file()?;
        cli_command()?
            .arg("state")
            .arg("--ontology")
            .arg(ontology.path())
            .arg("https://example.com/items/42")
            .assert()
            .success()
            .stdout("https://example.com/items/42\n");
        Ok(())
    }

    #[test]
    fn cli_query_substitutes_the_subject() -> Result<()> {
        let ontology = ontology_file()?;
        cli_command()?
            .arg("query")
            .arg("--ontology")
            .arg(ontology.path())
            .arg("https://example.com/items/42")
            .assert()
            .success()
            .stdout(predicate::str::contains("<https://example.com/items/42>"));
        Ok(())
    }

    #[test]
    fn cli_query_pages_a_container() -> Result<()> {
        let ontology = ontology_file()?;
        cli_command()?
            .arg("query")
            .arg("--ontology")
            .arg(ontology.path())
            .arg("https://example.com/items?limit=5&offset=10")
            .assert()
            .success()
            .stdout(predicate::str::contains("LIMIT 5").and(predicate::str::contains("OFFSET 10")));
        Ok(())
    }

    #[test]
    fn cli_update_substitutes_the_subject() -> Result<()> {
        let ontology = ontology_file()?;
        cli_command()?
            .arg("update")
            .arg("--ontology")
            .arg(ontology.path())
            .arg("https://example.com/items/42")
            .assert()
            .success()
            .stdout(
                predicate::str::contains("DELETE")
                    .and(predicate::str::contains("<https://example.com/items/42>")),
            );
        Ok(())
    }

    #[test]
    fn cli_update_fails_without_a_stored_update() -> Result<()> {
        let ontology = ontology_file()?;
        cli_command()?
            .arg("update")
            .arg("--ontology")
            .arg(ontology.path())
            .arg("https://example.com/items")
            .assert()
            .failure()
            .stderr(predicate::str::contains("has no stored update"));
        Ok(())
    }

    #[test]
    fn cli_unmatched_path_fails() -> Result<()> {
        let ontology = ontology_file()?;
        cli_command()?
            .arg("match")
            .arg("--ontology")
            .arg(ontology.path())
            .arg("https://example.com/nowhere/else")
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "no template matches path /nowhere/else",
            ));
        Ok(())
    }

    #[test]
    fn cli_skolemize_mints_uris() -> Result<()> {
        let ontology = ontology_file()?;
        let payload = NamedTempFile::new("payload.ttl")?;
        payload.write_str(
            r#"
            @prefix ex: <https://example.com/ns#> .
            [] a ex:Item ; ex:id "7" .
            "#,
        )?;
        cli_command()?
            .arg("skolemize")
            .arg("--ontology")
            .arg(ontology.path())
            .arg("--base")
            .arg("https://example.com/")
            .arg("--file")
            .arg(payload.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("<https://example.com/items/7>"));
        Ok(())
    }

    #[test]
    fn cli_skolemize_reads_standard_input() -> Result<()> {
        let ontology = ontology_file()?;
        cli_command()?
            .arg("skolemize")
            .arg("--ontology")
            .arg(ontology.path())
            .arg("--base")
            .arg("https://example.com/")
            .write_stdin(
                "<https://example.com/items/7> <https://example.com/ns#id> \"7\" .".to_owned(),
            )
            .assert()
            .success()
            .stdout(predicate::str::contains("<https://example.com/items/7>"));
        Ok(())
    }

    #[test]
    fn cli_help_lists_commands() -> Result<()> {
        cli_command()?
            .arg("--help")
            .assert()
            .success()
            .stdout(
                predicate::str::contains("match")
                    .and(predicate::str::contains("query"))
                    .and(predicate::str::contains("skolemize")),
            );
        Ok(())
    }
}
