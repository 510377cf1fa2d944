//! Pages intégrées, servies en URLs `data:`.
//!
//! - page d'accueil (saisie d'adresse, nettoyage de l'historique, thème et
//!   fond d'écran configurables)
//! - page d'erreur de navigation
//! - panneau de la surface Overlay
//!
//! Toutes parlent à l'hôte uniquement via `window.kioskAPI`, installé par le
//! script de pont.

/// Code d'échec « navigation annulée par l'utilisateur ».
pub const ABORTED_ERROR_CODE: i32 = -3;

/// Variables CSS des deux thèmes, dans l'ordre `(nom, clair, sombre)`.
const THEME_VARS: &[(&str, &str, &str)] = &[
    ("--bg-primary", "#ffffff", "#1a1a1a"),
    ("--bg-secondary", "#f5f5f5", "#2d2d2d"),
    ("--text-primary", "#333333", "#ffffff"),
    ("--text-secondary", "#555555", "#cccccc"),
    ("--border-color", "#ddd", "#444444"),
    ("--button-primary", "#4a90e2", "#5a9ef2"),
    ("--button-primary-hover", "#3a80d2", "#4a8ee2"),
    ("--error-color", "#e74c3c", "#ff6b6b"),
    ("--backdrop-blur", "rgba(255, 255, 255, 0.95)", "rgba(26, 26, 26, 0.95)"),
];

/// URL de la page d'accueil.
pub fn login_page_url() -> String {
    data_url(&login_html())
}

/// URL de la page d'erreur pour un échec de navigation.
pub fn error_page_url(code: i32, description: &str, is_child: bool) -> String {
    data_url(&error_html(code, description, is_child))
}

/// URL du panneau de la surface Overlay.
pub fn overlay_page_url() -> String {
    data_url(OVERLAY_HTML)
}

fn data_url(html: &str) -> String {
    format!("data:text/html;charset=utf-8,{}", url_encode(html))
}

fn theme_script() -> String {
    let mut light = String::new();
    let mut dark = String::new();
    for (name, l, d) in THEME_VARS {
        light.push_str(&format!("'{name}': '{l}', "));
        dark.push_str(&format!("'{name}': '{d}', "));
    }
    format!(
        r#"const themes = {{ light: {{ {light}}}, dark: {{ {dark}}} }};
const applyTheme = (name) => {{
  document.documentElement.setAttribute('data-theme', name);
  Object.entries(themes[name]).forEach(([k, v]) => document.documentElement.style.setProperty(k, v));
  localStorage.setItem('theme', name);
}};
const loadTheme = async () => {{
  let name = null;
  try {{
    const config = await window.kioskAPI.getAppConfig();
    if (config && config.theme in themes) {{ name = config.theme; }}
  }} catch (e) {{}}
  if (!name) {{
    const saved = localStorage.getItem('theme');
    if (saved in themes) {{ name = saved; }}
  }}
  if (!name) {{
    name = window.matchMedia('(prefers-color-scheme: dark)').matches ? 'dark' : 'light';
  }}
  applyTheme(name);
}};"#
    )
}

fn login_html() -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
<meta charset="utf-8">
<title>KioskShell</title>
<style>
* {{ margin: 0; padding: 0; box-sizing: border-box; }}
body {{
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    background: var(--bg-secondary) center / cover no-repeat;
    color: var(--text-primary);
    height: 100vh; display: flex; align-items: center; justify-content: center;
}}
.card {{
    background: var(--backdrop-blur); border: 1px solid var(--border-color);
    border-radius: 12px; padding: 32px; width: 480px;
    box-shadow: 0 8px 24px rgba(0, 0, 0, 0.15);
}}
h1 {{ font-size: 20px; margin-bottom: 20px; }}
input {{
    width: 100%; padding: 10px 12px; font-size: 15px; border-radius: 6px;
    border: 1px solid var(--border-color); background: var(--bg-primary);
    color: var(--text-primary); margin-bottom: 14px;
}}
.row {{ display: flex; gap: 10px; }}
button {{
    flex: 1; padding: 10px; border: none; border-radius: 6px; cursor: pointer;
    font-size: 14px; color: #fff; background: var(--button-primary);
}}
button:hover {{ background: var(--button-primary-hover); }}
button.secondary {{ background: transparent; color: var(--text-secondary); border: 1px solid var(--border-color); }}
.status {{ margin-top: 12px; font-size: 13px; color: var(--error-color); min-height: 1em; }}
</style>
</head>
<body>
<div class="card">
  <h1>KioskShell</h1>
  <input id="address" type="text" placeholder="https://" autofocus>
  <div class="row">
    <button id="go">Ouvrir</button>
    <button id="clear" class="secondary">Effacer l'historique</button>
    <button id="theme" class="secondary">Thème</button>
  </div>
  <div class="status" id="status"></div>
</div>
<script>
{theme}
const statusLine = document.getElementById('status');
const address = document.getElementById('address');
const go = async () => {{
  const value = address.value.trim();
  if (!value) {{ return; }}
  const ok = await window.kioskAPI.navigateToUrl(value);
  if (!ok) {{ statusLine.textContent = 'Navigation impossible'; }}
}};
document.getElementById('go').addEventListener('click', go);
address.addEventListener('keydown', (e) => {{ if (e.key === 'Enter') {{ go(); }} }});
document.getElementById('clear').addEventListener('click', () => window.kioskAPI.clearHistoryAndCache());
document.getElementById('theme').addEventListener('click', () => {{
  applyTheme(document.documentElement.getAttribute('data-theme') === 'dark' ? 'light' : 'dark');
}});
window.kioskAPI.onConfigUpdated(() => loadTheme());
window.kioskAPI.getBackgroundPath().then((path) => {{
  if (path) {{ document.body.style.backgroundImage = 'url("' + path + '")'; }}
}});
loadTheme();
</script>
</body>
</html>"#,
        theme = theme_script()
    )
}

fn error_html(code: i32, description: &str, is_child: bool) -> String {
    let message = html_escape(&format!(
        "Impossible de charger la page : {description} ({code})"
    ));
    let (label, action) = if is_child {
        ("Fermer", "closeWindow")
    } else {
        ("Retour", "returnToLogin")
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
<meta charset="utf-8">
<title>Erreur</title>
<style>
body {{
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    background: var(--bg-secondary, #f5f5f5); color: var(--text-primary, #333);
    height: 100vh; margin: 0; display: flex; align-items: center; justify-content: center;
}}
.box {{ text-align: center; max-width: 560px; }}
h1 {{ font-size: 22px; color: var(--error-color, #e74c3c); margin-bottom: 16px; }}
p {{ margin-bottom: 24px; line-height: 1.5; }}
button {{
    padding: 10px 28px; border: none; border-radius: 6px; cursor: pointer;
    color: #fff; background: var(--button-primary, #4a90e2); font-size: 14px;
}}
</style>
</head>
<body data-code="{code}" data-child="{is_child}">
<div class="box">
  <h1>Erreur de chargement</h1>
  <p id="message">{message}</p>
  <button id="back">{label}</button>
</div>
<script>
{theme}
document.getElementById('back').addEventListener('click', () => window.kioskAPI.{action}());
loadTheme();
</script>
</body>
</html>"#,
        theme = theme_script()
    )
}

const OVERLAY_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Controls</title>
<style>
body { margin: 0; padding: 0; background-color: rgba(0, 0, 0, 0.6); border-radius: 8px; overflow: hidden; }
.controls { display: flex; padding: 10px; gap: 10px; justify-content: center; }
.control-btn { width: 30px; height: 30px; border-radius: 50%; border: none; cursor: pointer; }
.back-btn { background-color: #4a90e2; }
.minimize-btn { background-color: #ffbd44; }
.maximize-btn { background-color: #00ca56; }
.close-btn { background-color: #ff605c; }
</style>
</head>
<body>
<div class="controls">
  <button class="control-btn back-btn" id="back"></button>
  <button class="control-btn minimize-btn" id="minimize"></button>
  <button class="control-btn maximize-btn" id="maximize"></button>
  <button class="control-btn close-btn" id="close"></button>
</div>
<script>
if (window.kioskAPI) {
  document.getElementById('back').addEventListener('click', () => window.kioskAPI.returnToLogin());
  document.getElementById('minimize').addEventListener('click', () => window.kioskAPI.minimizeWindow());
  document.getElementById('maximize').addEventListener('click', () => window.kioskAPI.maximizeWindow());
  document.getElementById('close').addEventListener('click', () => window.kioskAPI.closeWindow());
}
</script>
</body>
</html>"#;

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

/// Encodage pourcent minimal (RFC 3986, caractères non réservés conservés).
pub fn url_encode(input: &str) -> String {
    let mut result = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char)
            }
            _ => {
                result.push('%');
                result.push(char::from(HEX_CHARS[(byte >> 4) as usize]));
                result.push(char::from(HEX_CHARS[(byte & 0xf) as usize]));
            }
        }
    }
    result
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(url: &str) -> String {
        let encoded = url
            .strip_prefix("data:text/html;charset=utf-8,")
            .expect("data URL prefix");
        url::form_urlencoded::parse(format!("x={encoded}").as_bytes())
            .next()
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    }

    #[test]
    fn test_url_encode_basic() {
        assert_eq!(url_encode("a b"), "a%20b");
        assert_eq!(url_encode("#&?="), "%23%26%3F%3D");
        assert_eq!(url_encode("é"), "%C3%A9");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>\"x\" & y</b>"), "&lt;b&gt;&quot;x&quot; &amp; y&lt;/b&gt;");
    }

    #[test]
    fn test_error_page_carries_code_and_child_flag() {
        let html = decode(&error_page_url(-105, "NAME_NOT_RESOLVED", true));
        assert!(html.contains("data-code=\"-105\""));
        assert!(html.contains("data-child=\"true\""));
        assert!(html.contains("NAME_NOT_RESOLVED (-105)"));
        assert!(html.contains("kioskAPI.closeWindow()"));

        let main = decode(&error_page_url(-2, "FAILED", false));
        assert!(main.contains("data-child=\"false\""));
        assert!(main.contains("kioskAPI.returnToLogin()"));
    }

    #[test]
    fn test_error_description_is_escaped() {
        let html = decode(&error_page_url(-1, "<script>alert(1)</script>", false));
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_login_page_uses_bridge_api() {
        let html = decode(&login_page_url());
        for call in ["navigateToUrl", "clearHistoryAndCache", "getBackgroundPath", "getAppConfig"] {
            assert!(html.contains(call), "missing {call}");
        }
        assert!(html.contains("localStorage.getItem('theme')"));
    }

    #[test]
    fn test_overlay_page_has_four_buttons() {
        let html = decode(&overlay_page_url());
        assert_eq!(html.matches("class=\"control-btn").count(), 4);
    }
}
