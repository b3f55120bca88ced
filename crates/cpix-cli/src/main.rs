use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cpix_core::util::{
    base64_to_bytes, bytes_to_base64, bytes_to_guid, guid_to_bytes, strip_pem, wrap_pem,
    CERT_LABEL,
};
use cpix_core::{ContentKey, CpixMessage, DrmSystem, Recipient};

#[derive(Parser, Debug)]
#[command(author, version, about = "CPIX: build, inspect, and decrypt DASH-IF content protection documents")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Build a CPIX document from content keys and optional recipients
    Build {
        /// Content key as kid:value (dashed or plain hex kid, base64 value);
        /// repeatable
        #[arg(long = "key", num_args = 1.., required = true)]
        keys: Vec<String>,
        /// DRM system UUID applied to every key (e.g. Widevine
        /// edef8ba9-79d6-4ace-a3c8-27dcd51d21ed)
        #[arg(long = "system-id")]
        system_id: Option<String>,
        /// PSSH payload (base64) for the DRM system
        #[arg(long = "pssh", requires = "system_id")]
        pssh: Option<String>,
        /// Path(s) to recipient certificate (PEM); content keys are
        /// encrypted when at least one is given
        #[arg(long = "recipient-cert", num_args = 0..)]
        recipient_certs: Vec<PathBuf>,
        /// contentId attribute for the document root
        #[arg(long = "content-id")]
        content_id: Option<String>,
        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Parse a CPIX document and summarize its contents
    Inspect {
        /// Input CPIX XML file
        input: PathBuf,
        /// Also print each recipient's certificate as PEM (reusable with
        /// `build --recipient-cert`)
        #[arg(long)]
        certs: bool,
    },
    /// Decrypt the content keys of a CPIX document with an RSA private key
    /// and print them
    Decrypt {
        /// Input CPIX XML file
        #[arg(long)]
        input: PathBuf,
        /// RSA private key (PEM or DER) matching one of the recipients
        #[arg(long = "private-key")]
        private_key: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().cmd {
        Cmd::Build {
            keys,
            system_id,
            pssh,
            recipient_certs,
            content_id,
            output,
        } => build(keys, system_id, pssh, recipient_certs, content_id, output),
        Cmd::Inspect { input, certs } => inspect(input, certs),
        Cmd::Decrypt { input, private_key } => decrypt(input, private_key),
    }
}

fn build(
    keys: Vec<String>,
    system_id: Option<String>,
    pssh: Option<String>,
    recipient_certs: Vec<PathBuf>,
    content_id: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut message = CpixMessage::new();
    message.content_id = content_id;

    for path in &recipient_certs {
        let pem = fs::read_to_string(path)
            .with_context(|| format!("reading certificate {}", path.display()))?;
        let mut recipient = Recipient::default();
        recipient.delivery_key =
            base64_to_bytes(&strip_pem(&pem)).context("certificate is not PEM")?;
        message.add_recipient(recipient)?;
    }

    for entry in &keys {
        let Some((kid, value)) = entry.split_once(':') else {
            bail!("--key takes kid:value, got {entry}");
        };
        let mut key = ContentKey::default();
        key.kid = guid_to_bytes(kid)?;
        key.set_key_value(base64_to_bytes(value)?);

        let drm_systems = match &system_id {
            Some(system_id) => {
                let mut drm = DrmSystem::default();
                drm.system_id = guid_to_bytes(system_id)?;
                if let Some(pssh) = &pssh {
                    drm.pssh = base64_to_bytes(pssh)?;
                }
                vec![drm]
            }
            None => vec![],
        };
        message.add_content_key_with(key, drm_systems, vec![])?;
    }

    emit(&message.to_xml()?, output)
}

fn inspect(input: PathBuf, certs: bool) -> Result<()> {
    let xml =
        fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;
    let message = CpixMessage::from_xml(&xml)?;

    if let Some(content_id) = &message.content_id {
        println!("contentId: {content_id}");
    }
    println!("recipients: {}", message.recipients().len());
    if certs {
        for recipient in message.recipients() {
            print!(
                "{}",
                wrap_pem(CERT_LABEL, &bytes_to_base64(&recipient.delivery_key))
            );
        }
    }
    println!("content keys: {}", message.content_keys().len());
    for key in message.content_keys() {
        let form = if key.is_encrypted() { "encrypted" } else { "clear" };
        println!("  {} ({form})", bytes_to_guid(&key.kid));
    }
    println!("drm systems: {}", message.drm_systems().len());
    for drm in message.drm_systems() {
        println!(
            "  {} -> {}",
            bytes_to_guid(&drm.system_id),
            bytes_to_guid(&drm.kid)
        );
    }
    println!("usage rules: {}", message.usage_rules().len());
    println!("key periods: {}", message.key_periods().len());
    Ok(())
}

fn decrypt(input: PathBuf, private_key: PathBuf) -> Result<()> {
    let xml =
        fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;
    let mut message = CpixMessage::from_xml(&xml)?;

    let key_bytes = fs::read(&private_key)
        .with_context(|| format!("reading {}", private_key.display()))?;
    // Accept PEM by stripping the armor down to DER.
    let der = match std::str::from_utf8(&key_bytes) {
        Ok(text) if text.contains("-----BEGIN") => base64_to_bytes(&strip_pem(text))?,
        _ => key_bytes,
    };
    message.decrypt_with(&der)?;

    for key in message.content_keys() {
        println!(
            "{}: {}",
            bytes_to_guid(&key.kid),
            bytes_to_base64(key.key_value())
        );
    }
    Ok(())
}

fn emit(xml: &str, output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(&path, xml).with_context(|| format!("writing {}", path.display()))?
        }
        None => println!("{xml}"),
    }
    Ok(())
}
