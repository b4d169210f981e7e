use anyhow::{Error, anyhow};

/// One scripted page interaction.
#[derive(Clone, Debug, PartialEq)]
pub enum Interaction {
    Click(String),
    Focus(String),
    Submit(String),
    Scroll { top: f64, height: f64, viewport: f64 },
    Insert { selector: String, html: String },
    Hide,
    Show,
    Tick,
}

fn number(raw: Option<&str>, name: &str) -> Result<f64, Error> {
    let raw = raw.ok_or_else(|| anyhow!("scroll needs {name}"))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|err| anyhow!("scroll {name} {raw:?}: {err}"))
}

/// Parse one interaction such as `click:.hero a` or `scroll:600:3000:800`.
pub fn parse_interaction(raw: &str) -> Result<Interaction, Error> {
    let raw = raw.trim();
    let (verb, rest) = raw.split_once(':').unwrap_or((raw, ""));
    let rest = rest.trim();
    let selector = || {
        if rest.is_empty() {
            Err(anyhow!("{verb} needs a selector"))
        } else {
            Ok(rest.to_owned())
        }
    };
    Ok(match verb {
        "click" => Interaction::Click(selector()?),
        "focus" => Interaction::Focus(selector()?),
        "submit" => Interaction::Submit(selector()?),
        "scroll" => {
            let mut parts = rest.split(':');
            Interaction::Scroll {
                top: number(parts.next(), "top")?,
                height: number(parts.next(), "height")?,
                viewport: number(parts.next(), "viewport")?,
            }
        }
        "insert" => {
            let (selector, html) = rest
                .split_once(':')
                .ok_or_else(|| anyhow!("insert needs <selector>:<html>"))?;
            Interaction::Insert {
                selector: selector.trim().to_owned(),
                html: html.to_owned(),
            }
        }
        "hide" => Interaction::Hide,
        "show" => Interaction::Show,
        "tick" => Interaction::Tick,
        other => return Err(anyhow!("unknown interaction {other:?}")),
    })
}

/// Parse a `;` separated script. Blank entries are skipped.
pub fn parse_script(raw: &str) -> Result<Vec<Interaction>, Error> {
    raw.split(';')
        .filter(|entry| !entry.trim().is_empty())
        .map(parse_interaction)
        .collect()
}
