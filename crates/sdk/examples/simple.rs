//! Simple SDK Example
//!
//! Runs a shell snippet through the local agent and prints its events.
//!
//! # Usage
//!
//! 1. Start the agent:
//!    ```bash
//!    cargo run --package snippet-run-daemon
//!    ```
//!
//! 2. Run this example:
//!    ```bash
//!    cargo run --package snippet-run-sdk --example simple
//!    ```

use snippet_run_sdk::{FileSpec, OutputStream, RunEvent, SessionInfo, SnippetRunClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Snippet Run SDK - Simple Example");
    println!("================================\n");

    // 1. Connect using the agent's session file
    println!("1. Connecting to agent...");
    let session = SessionInfo::load(&SessionInfo::default_path())?;
    let client = SnippetRunClient::connect(&session.url, session.token).await?;
    let handshake = client.handshake().await?;
    println!("   ✓ Connected (agent v{})\n", handshake.version);

    // 2. List rules
    println!("2. Rules in evaluation order:");
    for rule in client.rules().await?.rules.iter().take(5) {
        println!("     {:>2}. {}", rule.index, rule.label);
    }
    println!();

    // 3. Run a snippet
    println!("3. Running hello.sh...");
    let mut run = client
        .run(
            "simple-example",
            FileSpec::new("hello.sh", "shell", "echo hi\necho oops >&2\nexit 3"),
        )
        .await?;

    while let Some(event) = run.next().await {
        match event? {
            RunEvent::Output { data, stream } => {
                let tag = match stream {
                    OutputStream::Stdout => "out",
                    OutputStream::Stderr => "err",
                };
                print!("     [{}] {}", tag, data);
            }
            RunEvent::Exit { code } => println!("   ✓ Exited with code {}", code),
        }
    }

    println!("\n✓ Example completed successfully!");

    Ok(())
}
