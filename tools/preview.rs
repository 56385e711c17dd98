/// Preview: interactive generation shell for testing grammars.
///
/// Usage: preview --grammar <path> [--grammar <path> ...] [--seed <n>] [--root <tag>]
///
/// Commands:
///   run [tag] [n]        expand a tag n times (default: the root tag, once)
///   set <key> <value>    set a namespace value (number, true/false, or text)
///   unset <key>          remove a namespace value
///   data                 print the namespace
///   reset                restore the namespace loaded from the grammars
///   rules <tag>          list the rules for a tag
///   eligible <tag>       list the rules that could fire right now
///   seed <n>             restart the RNG from a seed
///   help                 list commands
///   quit                 exit
///
/// Set RUST_LOG=tag_grammar=debug to watch rule selection.
use std::io::{self, BufRead, Write};
use tag_grammar::{Datum, Engine, Rule, TagId, TagRef};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(io::stderr),
        )
        .init();

    let mut grammar_paths = Vec::new();
    let mut seed: u64 = 0;
    let mut root = "root".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--grammar" if i + 1 < args.len() => {
                i += 1;
                grammar_paths.push(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(0);
            }
            "--root" if i + 1 < args.len() => {
                i += 1;
                root = args[i].clone();
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = Engine::builder().seed(seed);
    for path in &grammar_paths {
        builder = builder.grammar_file(path);
    }
    let mut engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Failed to load grammars: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "Loaded {} rules for {} tags",
        engine.rules().len(),
        engine.rules().tags().count()
    );
    println!("Seed: {}", seed);
    println!("Type 'help' for commands.\n");

    let mut data = engine.namespace();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
            }
            "run" => {
                let name = parts.get(1).copied().unwrap_or(root.as_str());
                let Some(tag) = TagId::parse(name) else {
                    println!("Invalid tag: {}", name);
                    continue;
                };
                let count: usize = match parts.get(2) {
                    Some(n) => match n.parse() {
                        Ok(n) if n > 0 => n,
                        _ => {
                            println!("Invalid count: {}", n);
                            continue;
                        }
                    },
                    None => 1,
                };
                for _ in 0..count {
                    match engine.run(&tag, &mut data) {
                        Ok(text) => println!("{}", text),
                        Err(e) => {
                            println!("ERROR: {}", e);
                            break;
                        }
                    }
                }
            }
            "set" => {
                if parts.len() < 3 {
                    println!("Usage: set <key> <value>");
                    continue;
                }
                let value = parse_value(&parts[2..].join(" "));
                println!("{} = {}", parts[1], value);
                data.set(parts[1], value);
            }
            "unset" => {
                if parts.len() < 2 {
                    println!("Usage: unset <key>");
                    continue;
                }
                if data.remove(parts[1]).is_none() {
                    println!("No value for '{}'", parts[1]);
                }
            }
            "data" => {
                if data.is_empty() {
                    println!("(empty)");
                } else {
                    print!("{}", data);
                }
            }
            "reset" => {
                data = engine.namespace();
                println!("Namespace restored ({} values).", data.len());
            }
            "rules" => {
                let Some(tag) = parts.get(1).and_then(|t| TagId::parse(t)) else {
                    println!("Usage: rules <tag>");
                    continue;
                };
                let rules = engine.rules().rules_for(&tag);
                if rules.is_empty() {
                    println!("No rules for {}", tag);
                }
                for rule in rules {
                    print_rule(rule);
                }
            }
            "eligible" => {
                let Some(tag) = parts.get(1).and_then(|t| TagId::parse(t)) else {
                    println!("Usage: eligible <tag>");
                    continue;
                };
                match engine.eligible_rules(&TagRef::new(tag), &data) {
                    Ok(rules) if rules.is_empty() => println!("Nothing can fire."),
                    Ok(rules) => {
                        for rule in rules {
                            print_rule(rule);
                        }
                    }
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "seed" => {
                if parts.len() < 2 {
                    println!("Current seed: {}", engine.seed());
                    continue;
                }
                match parts[1].parse::<u64>() {
                    Ok(s) => {
                        engine.reseed(s);
                        println!("Seed set to {}", s);
                    }
                    Err(_) => {
                        println!("Invalid seed: {}", parts[1]);
                    }
                }
            }
            _ => {
                println!("Unknown command: {}. Type 'help' for commands.", cmd);
            }
        }
    }
}

fn parse_value(raw: &str) -> Datum {
    match raw {
        "true" => Datum::Boolean(true),
        "false" => Datum::Boolean(false),
        _ => match raw.parse::<f64>() {
            Ok(n) => Datum::Number(n),
            Err(_) => Datum::Text(raw.to_string()),
        },
    }
}

fn print_rule(rule: &Rule) {
    let mut details = format!(
        "  p={} min={} freq={}",
        rule.priority(),
        rule.min_priority(),
        rule.frequency()
    );
    if let Some(guard) = &rule.guard {
        details.push_str(&format!(" when `{}`", guard));
    }
    if !rule.hashtags.is_empty() {
        let mut tags: Vec<&String> = rule.hashtags.iter().collect();
        tags.sort();
        details.push_str(&format!(" #{:?}", tags));
    }
    println!("{}\n    {}", details, rule.output);
}

fn print_usage() {
    println!("Usage: preview --grammar <path> [--grammar <path> ...] [--seed <n>] [--root <tag>]");
    println!();
    println!("Interactive generation shell for testing grammars.");
    println!();
    println!("Options:");
    println!("  --grammar <path>  RON grammar file (repeatable; later files merge in)");
    println!("  --seed <n>        RNG seed (default: 0)");
    println!("  --root <tag>      Tag expanded by a bare 'run' (default: root)");
}

fn print_help() {
    println!("Commands:");
    println!("  run [tag] [n]        expand a tag n times (default: the root tag, once)");
    println!("  set <key> <value>    set a namespace value (number, true/false, or text)");
    println!("  unset <key>          remove a namespace value");
    println!("  data                 print the namespace");
    println!("  reset                restore the namespace loaded from the grammars");
    println!("  rules <tag>          list the rules for a tag");
    println!("  eligible <tag>       list the rules that could fire right now");
    println!("  seed <n>             restart the RNG from a seed");
    println!("  help                 list commands");
    println!("  quit                 exit");
}
