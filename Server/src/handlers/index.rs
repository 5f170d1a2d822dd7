// handlers/index.rs

use axum::response::Html;
use tracing::instrument;

use crate::types::MANIFEST_FILENAME;

/// dash.js player page pointed at the session manifest.
#[instrument(skip_all)]
pub async fn serve_index() -> Html<String> {
    Html(INDEX_HTML.replace("{manifest}", MANIFEST_FILENAME))
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">

<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Live stream</title>
    <style>
        body {
            margin: 0;
            min-height: 100vh;
            display: flex;
            justify-content: center;
            align-items: center;
            background: linear-gradient(135deg, #1e3c72, #2a5298);
            font-family: sans-serif;
            color: white;
        }
        .container {
            display: flex;
            flex-direction: column;
            align-items: center;
        }
        .card {
            width: 1000px;
            height: 600px;
            background-color: rgba(255,255,255,0.1);
            margin: 100px;
            border-radius: 15px;
            box-shadow: 20px 20px 50px rgba(0,0,0,0.5);
            overflow: hidden;
            display: flex;
            justify-content: center;
            align-items: center;
            border-top: 1px solid rgba(255,255,255,0.5);
            border-left: 1px solid rgba(255,255,255,0.5);
            backdrop-filter: blur(5px);
        }
        video {
            width: 750px;
            height: 450px;
        }
    </style>
</head>

<body>
<div class="container">
    <p>If no video appears, try reloading the page</p>
    <div class="card">
        <video id="videoPlayer" controls muted autoplay></video>
    </div>
</div>
    <script src="https://cdn.dashjs.org/latest/dash.all.debug.js"></script>
    <script>
        (function () {
            var url = "{manifest}";
            var player = dashjs.MediaPlayer().create();
            player.initialize(document.querySelector("#videoPlayer"), url, true);
        })();
    </script>
</body>

</html>
"##;
