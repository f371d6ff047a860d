//! The single-page UI served at `/`.
//!
//! Search results and download progress are rendered client-side. The
//! inline script runs the same state machine as `dropcore::session`:
//! idle → searching → idle, idle → downloading → done | error | cancelled.

/// `Content-Security-Policy` for the page.
///
/// Images are limited to the configured thumbnail hosts; scripts and styles
/// are the inline ones below.
pub fn content_security_policy(thumbnail_hosts: &[String]) -> String {
    let mut img_src = String::from("'self'");
    for host in thumbnail_hosts.iter().filter(|h| is_plain_host(h)) {
        img_src.push_str(" https://");
        img_src.push_str(host);
    }
    format!(
        "default-src 'self'; img-src {}; script-src 'unsafe-inline'; style-src 'unsafe-inline'; connect-src 'self'",
        img_src
    )
}

/// Hostnames only; anything that could smuggle extra CSP directives is skipped.
fn is_plain_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '*'))
}

/// Renders the page.
pub fn render_index(thumbnail_hosts: &[String]) -> String {
    let hosts: Vec<&str> = thumbnail_hosts.iter().map(String::as_str).filter(|h| is_plain_host(h)).collect();
    let hosts_json = serde_json::to_string(&hosts).unwrap_or_else(|_| "[]".to_string());
    INDEX_TEMPLATE.replace("__THUMBNAIL_HOSTS__", &hosts_json)
}

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>tubedrop</title>
<style>
*{box-sizing:border-box;margin:0;padding:0}
body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;background:#0f0f13;color:#eee;min-height:100vh;padding:32px 16px}
main{max-width:760px;margin:0 auto}
h1{font-size:28px;margin-bottom:20px}
form{display:flex;gap:8px;margin-bottom:24px}
input{flex:1;padding:12px 14px;border-radius:10px;border:1px solid #333;background:#1b1b22;color:#eee;font-size:15px}
button{padding:10px 16px;border:0;border-radius:10px;background:#e53935;color:#fff;font-weight:600;cursor:pointer}
button:disabled{opacity:.5;cursor:default}
.result{display:flex;gap:12px;align-items:center;padding:10px;border-radius:12px;background:#18181f;margin-bottom:10px}
.result img{width:120px;height:68px;object-fit:cover;border-radius:8px;background:#222}
.result .meta{flex:1;min-width:0}
.result .title{font-size:14px;line-height:1.3;overflow:hidden;text-overflow:ellipsis}
.result .duration{font-size:12px;color:#999;margin-top:4px}
#panel{display:none;padding:16px;border-radius:12px;background:#18181f;margin-bottom:24px}
#panel.visible{display:block}
#status{font-size:14px;margin-bottom:10px}
.bar{height:8px;border-radius:4px;background:#2a2a33;overflow:hidden}
.bar div{height:100%;width:0;background:#e53935;transition:width .2s}
#save{display:none;margin-top:12px;color:#4fc3f7}
#panel.done #save{display:inline-block}
#panel.error #status{color:#ef5350}
</style>
</head>
<body>
<main>
<h1>tubedrop</h1>
<form id="search">
<input id="query" type="search" placeholder="Search YouTube" autocomplete="off">
<button id="search-btn" type="submit">Search</button>
</form>
<section id="panel">
<p id="status"></p>
<div class="bar"><div id="progress"></div></div>
<a id="save" download>Save MP3</a>
<button id="cancel" type="button">Cancel</button>
</section>
<section id="results"></section>
</main>
<script>
const THUMBNAIL_HOSTS = __THUMBNAIL_HOSTS__;
const $ = (id) => document.getElementById(id);

let state = 'idle';
let source = null;
let file = null;

function terminal() {
  return state === 'done' || state === 'error' || state === 'cancelled';
}

function render(status, progress) {
  const panel = $('panel');
  panel.className = 'visible ' + state;
  if (status !== undefined) $('status').textContent = status;
  if (progress !== undefined) $('progress').style.width = progress + '%';
  $('cancel').style.display = state === 'downloading' ? 'inline-block' : 'none';
  if (state === 'done') $('save').href = '/downloads/' + encodeURIComponent(file);
}

function closeStream() {
  if (source) {
    source.close();
    source = null;
  }
}

function fail(message) {
  closeStream();
  state = 'error';
  render(message);
}

function cancel() {
  if (state !== 'downloading') return;
  closeStream();
  state = 'cancelled';
  render('Download cancelled');
}

function onLine(line) {
  if (terminal()) return;
  if (line.startsWith('PROGRESS:')) {
    const percent = parseFloat(line.slice(9));
    if (!isNaN(percent)) render('Downloading... ' + percent + '%', Math.min(Math.max(percent, 0), 100));
  } else if (line.startsWith('STEP:')) {
    render(line.slice(5));
  } else if (line.startsWith('FILE:')) {
    file = line.slice(5).trim().split(/[\\/]/).pop();
    render('Process complete');
  } else if (line.startsWith('ERROR:')) {
    fail(line.slice(6));
  } else if (line === 'DONE') {
    closeStream();
    if (file) {
      state = 'done';
      render(undefined, 100);
    } else {
      fail('Download finished without a file');
    }
  }
}

function download(videoId) {
  cancel();
  file = null;
  state = 'downloading';
  render('Starting...', 0);
  const url = 'https://www.youtube.com/watch?v=' + videoId;
  source = new EventSource('/api/download?url=' + encodeURIComponent(url));
  source.onmessage = (event) => {
    for (const line of event.data.split('\n')) onLine(line.trim());
  };
  source.onerror = () => {
    if (!terminal()) fail('Error occurred during download.');
  };
}

function allowedThumbnail(src) {
  try {
    const url = new URL(src);
    return url.protocol === 'https:' && THUMBNAIL_HOSTS.includes(url.hostname);
  } catch (_) {
    return false;
  }
}

function showResults(items) {
  const results = $('results');
  results.replaceChildren();
  for (const item of items) {
    const row = document.createElement('div');
    row.className = 'result';
    const img = document.createElement('img');
    img.alt = '';
    if (allowedThumbnail(item.thumbnail)) img.src = item.thumbnail;
    const meta = document.createElement('div');
    meta.className = 'meta';
    const title = document.createElement('div');
    title.className = 'title';
    title.textContent = item.title;
    const duration = document.createElement('div');
    duration.className = 'duration';
    duration.textContent = item.duration;
    meta.append(title, duration);
    const button = document.createElement('button');
    button.type = 'button';
    button.textContent = 'MP3';
    button.onclick = () => download(item.videoId);
    row.append(img, meta, button);
    results.append(row);
  }
}

$('search').onsubmit = async (event) => {
  event.preventDefault();
  const query = $('query').value.trim();
  if (!query || state === 'searching') return;
  const previous = terminal() ? 'idle' : state;
  if (state !== 'downloading') state = 'searching';
  $('search-btn').disabled = true;
  try {
    const response = await fetch('/api/search?query=' + encodeURIComponent(query));
    const body = await response.json();
    if (!response.ok) throw new Error(body.error || response.statusText);
    showResults(body.items);
  } catch (err) {
    $('results').textContent = 'Search failed: ' + err.message;
  } finally {
    if (state === 'searching') state = previous;
    $('search-btn').disabled = false;
  }
};

$('cancel').onclick = cancel;
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_default_host() {
        let csp = content_security_policy(&["i.ytimg.com".to_string()]);
        assert!(csp.contains("img-src 'self' https://i.ytimg.com;"));
    }

    #[test]
    fn test_csp_skips_suspicious_hosts() {
        let csp = content_security_policy(&["i.ytimg.com; script-src *".to_string(), "img.example.org".to_string()]);
        assert!(csp.contains("img-src 'self' https://img.example.org;"));
        assert!(!csp.contains("script-src *"));
    }

    #[test]
    fn test_render_index_injects_hosts() {
        let page = render_index(&["i.ytimg.com".to_string()]);
        assert!(page.contains(r#"const THUMBNAIL_HOSTS = ["i.ytimg.com"];"#));
        assert!(!page.contains("__THUMBNAIL_HOSTS__"));
    }
}
