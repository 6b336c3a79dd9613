//! `docs ask` and `docs chat`.

use anyhow::Result;
use std::io::{BufRead, Write};
use std::sync::Arc;

use docs_assistant_core::Embedder;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generate::{create_generator, Generator};
use crate::qa::{answer_question, Answer, Conversation, QaOptions};

fn print_answer(answer: &Answer) {
    println!("{}", answer.answer.trim());
    if answer.hits.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for (i, hit) in answer.hits.iter().enumerate() {
        println!("  [{}] {} (score {:.2})", i + 1, hit.chunk.source(), hit.score);
    }
}

struct Session {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    options: QaOptions,
}

impl Session {
    /// Providers are created up front so a missing API key fails before any
    /// index access.
    fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            generator: create_generator(&config.generation)?,
            embedder: create_embedder(&config.embedding)?,
            options: QaOptions::from_config(config),
        })
    }

    async fn ask(
        &self,
        config: &Config,
        question: &str,
        conversation: &mut Conversation,
    ) -> Result<Answer> {
        answer_question(
            config.namespace_dir(),
            self.embedder.clone(),
            self.generator.as_ref(),
            question,
            self.options,
            conversation,
        )
        .await
    }
}

pub async fn run_ask(config: &Config, question: &str, json: bool) -> Result<()> {
    let session = Session::new(config)?;
    let mut conversation = Conversation::new();
    let answer = session.ask(config, question, &mut conversation).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer);
    }
    Ok(())
}

/// Line-oriented chat. `exit`, `quit` or end of input leaves; `/reset`
/// forgets the conversation so far.
pub async fn run_chat(config: &Config) -> Result<()> {
    let session = Session::new(config)?;
    let mut conversation = Conversation::new();
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    eprintln!("Ask about your documents. Type 'exit' to quit.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let question = line?;
        let question = question.trim();
        match question {
            "" => continue,
            "exit" | "quit" => break,
            "/reset" => {
                conversation.clear();
                println!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        // A failed question is reported and the session continues.
        match session.ask(config, question, &mut conversation).await {
            Ok(answer) => print_answer(&answer),
            Err(e) => eprintln!("Error: {:#}", e),
        }
        println!();
    }
    Ok(())
}
