use anyhow::Context;
use clap::Parser;
use reqwest::Client;

/// Smoke-test client for a running gastos server.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    #[arg(long)]
    cidade: Option<String>,

    #[arg(long)]
    ano: Option<String>,

    /// Ask the server to reload its dataset before querying.
    #[arg(long)]
    reload: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = Client::new();
    let base = args.url.trim_end_matches('/');

    if args.reload {
        let res = client
            .post(format!("{base}/gastos/reload"))
            .send()
            .await
            .context("Reload request failed")?;

        println!("Reload: {}", res.status());
        println!("{}\n", res.text().await?);
    }

    let mut params = Vec::new();
    if let Some(cidade) = &args.cidade {
        params.push(("cidade", cidade.as_str()));
    }
    if let Some(ano) = &args.ano {
        params.push(("ano", ano.as_str()));
    }

    let res = client
        .get(format!("{base}/gastos"))
        .query(&params)
        .send()
        .await
        .context("Lookup request failed")?;

    println!("Status: {}", res.status());
    println!("{}", res.text().await?);

    Ok(())
}
