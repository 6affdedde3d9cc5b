/*!
 * Rediska Probe
 *
 * Sends a single inline command to a Redis-compatible server and prints the
 * reply. Leading `key=value` arguments configure the connection using the
 * same option names the library accepts:
 *
 *     rediska host=10.0.0.5 port=6380 password=secret GET greeting
 */

use anyhow::*;
use rediska::{Connection, OptionValue};

/// Main function - entry point for the probe
///
/// 1. Initialize logging
/// 2. Split option pairs from the command words
/// 3. Write the command and print the reply
fn main() -> Result<()> {
    // Respects RUST_LOG, e.g. RUST_LOG=rediska=trace
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let split = args.iter().position(|a| !a.contains('=')).unwrap_or(args.len());
    let (pairs, words) = args.split_at(split);

    if words.is_empty() {
        bail!("usage: rediska [option=value ...] COMMAND [ARG ...]");
    }

    let pairs = pairs.iter().filter_map(|p| {
        p.split_once('=')
            .map(|(k, v)| (k.to_string(), OptionValue::from(v)))
    });
    let mut conn = Connection::from_options(pairs).context("invalid option")?;

    conn.write(words.join(" "))
        .with_context(|| format!("sending command to {}", conn))?;
    print_reply(&mut conn)?;

    conn.disconnect();
    Ok(())
}

/// Print one reply, descending into multi-bulk replies
fn print_reply(conn: &mut Connection) -> Result<()> {
    let line = conn.read_line()?;
    let (kind, rest) = match line.char_indices().nth(1) {
        Some((idx, _)) => line.split_at(idx),
        None => (line.as_str(), ""),
    };

    match kind {
        "+" | ":" => println!("{}", rest),
        "-" => bail!("server error: {}", rest),
        "$" => {
            let len: i64 = rest.parse().context("bad bulk length")?;
            if len < 0 {
                println!("(nil)");
            } else {
                let payload = conn.read(len as usize)?;
                println!("{}", String::from_utf8_lossy(&payload));
            }
        }
        "*" => {
            let count: i64 = rest.parse().context("bad multi-bulk count")?;
            for _ in 0..count.max(0) {
                print_reply(conn)?;
            }
        }
        _ => bail!("unexpected reply: {}", line),
    }
    Ok(())
}
