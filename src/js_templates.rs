//! Single-expression scripts evaluated in page context. Dynamic content is
//! passed through base64 so no user data ever needs JS string escaping.

use crate::snapshot::RequestSnapshot;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

pub fn escape_js_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Navigational body replay: rebuilds the edited body as a form in the page
/// and submits it. Returns `null` on success or the error message as a
/// string; the caller forwards a non-null result to the control surface.
///
/// Only form enctypes can be produced from page context; snapshots declared
/// with a non-form codec are framed as `text/plain` and rely on the active
/// session rule to rewrite the content-type header on the wire.
pub fn submit_body(snapshot: &RequestSnapshot) -> String {
    let url = escape_js_string(&snapshot.url);
    let body_b64 = BASE64.encode(&snapshot.body.content);
    let form_encoded = snapshot.body.enctype == "application/x-www-form-urlencoded"
        || snapshot.body.enctype == "multipart/form-data";
    let enctype = if form_encoded {
        escape_js_string(&snapshot.body.enctype)
    } else {
        "text/plain".to_string()
    };

    if form_encoded {
        format!(
            r#"(function(){{try{{var f=document.createElement('form');f.method='post';f.action='{url}';f.enctype='{enctype}';f.style.display='none';var body=atob('{body_b64}');body.split('&').forEach(function(pair){{if(!pair)return;var i=pair.indexOf('=');var k=i<0?pair:pair.slice(0,i);var v=i<0?'':pair.slice(i+1);var input=document.createElement('input');input.type='hidden';input.name=decodeURIComponent(k.replace(/\+/g,' '));input.value=decodeURIComponent(v.replace(/\+/g,' '));f.appendChild(input)}});document.body.appendChild(f);f.submit();return null}}catch(e){{return String(e)}}}})()"#
        )
    } else {
        format!(
            r#"(function(){{try{{var f=document.createElement('form');f.method='post';f.action='{url}';f.enctype='{enctype}';f.style.display='none';var input=document.createElement('input');input.type='hidden';input.name=atob('{body_b64}');input.value='';f.appendChild(input);document.body.appendChild(f);f.submit();return null}}catch(e){{return String(e)}}}})()"#
        )
    }
}

/// Default in-page test harness: collects forwarded test payloads on
/// `window.__reqedit_test__` for the page (or a probe script) to inspect.
pub const TEST_HARNESS: &str = r#"(function(){if(window.__reqedit_test__)return true;window.__reqedit_test__=[];document.addEventListener('request-editor:test',function(e){window.__reqedit_test__.push(e.detail)});return true})()"#;

/// Console echo probe, useful when driving the harness by hand.
pub const ECHO_PROBE: &str = r#"(function(){document.addEventListener('request-editor:test',function(e){console.log('[request-editor]',e.detail)});return true})()"#;

/// Resolve a script name from a test command's payload.
pub fn named_test_script(name: &str) -> String {
    match name {
        "echo" => ECHO_PROBE.to_string(),
        _ => TEST_HARNESS.to_string(),
    }
}

/// Delivers a test payload into the page as a DOM event.
pub fn forward_test(payload: &serde_json::Value) -> String {
    let payload_b64 = BASE64.encode(payload.to_string());
    format!(
        r#"(function(){{try{{document.dispatchEvent(new CustomEvent('request-editor:test',{{detail:JSON.parse(atob('{payload_b64}'))}}));return null}}catch(e){{return String(e)}}}})()"#
    )
}
