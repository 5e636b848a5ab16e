//! Minimal CGI program that echoes the request it was handed.
//!
//! Run it behind any CGI-capable server, or fake the environment:
//!
//!   echo -n 'name=ada' | REQUEST_METHOD=POST \
//!       CONTENT_TYPE=application/x-www-form-urlencoded \
//!       HTTP_HOST=localhost:8080 REQUEST_URI='/hello?x=1' \
//!       cargo run --example cgi_dump
//!
//! Logs go to stderr; stdout is the CGI response.

use cgi_request::{Environment, Inputs, ServerRequest, UploadNode, UploadedFiles};
use tokio::io::AsyncReadExt;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stderr)
        .init();

    let env = Environment::from_process();

    let mut body = Vec::new();
    if let Err(e) = tokio::io::stdin().read_to_end(&mut body).await {
        tracing::warn!("could not read request body: {e}");
    }

    let inputs = Inputs::from_environment(&env, body);
    let req = match ServerRequest::from_environment(env, inputs) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("{e}");
            print!("Status: 400 Bad Request\r\nContent-Type: text/plain\r\n\r\n{e}\n");
            return;
        }
    };

    print!("Content-Type: text/plain; charset=utf-8\r\n\r\n");
    println!("{} {} HTTP/{}", req.method(), req.request_target(), req.protocol_version());
    println!("uri: {}", req.uri());

    println!("\nheaders:");
    for (name, values) in req.headers().iter() {
        println!("  {name}: {}", values.join(", "));
    }

    println!("\ncookies:");
    for (name, value) in req.cookie_params() {
        println!("  {name} = {value}");
    }

    println!("\nquery:");
    for (name, value) in req.query_params() {
        println!("  {name} = {value}");
    }

    if let Some(fields) = req.parsed_body().fields() {
        println!("\nform:");
        for (name, value) in fields {
            println!("  {name} = {value}");
        }
    }

    println!("\nuploads: {}", req.uploaded_files().file_count());
    print_uploads(req.uploaded_files(), 1);

    println!("\nbody: {} bytes", req.body().len());
}

fn print_uploads(files: &UploadedFiles, depth: usize) {
    let pad = "  ".repeat(depth);
    for (key, node) in files.iter() {
        match node {
            UploadNode::File(file) => println!(
                "{pad}{key}: {} ({} bytes, {:?})",
                file.client_filename().unwrap_or("-"),
                file.size(),
                file.error(),
            ),
            UploadNode::Nested(nested) => {
                println!("{pad}{key}:");
                print_uploads(nested, depth + 1);
            }
        }
    }
}
