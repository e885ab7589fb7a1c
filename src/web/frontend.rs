//! Embedded HTML/CSS/JS frontend for the wastemeter dashboard.
//!
//! The entire SPA is compiled into the binary as a string constant.
//! No external assets, no build tools, no CDN dependencies.

/// The complete single-page dashboard HTML.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>wastemeter Dashboard</title>
<style>
:root {
  --bg: #0d1117;
  --surface: #161b22;
  --border: #30363d;
  --text: #e6edf3;
  --text-muted: #8b949e;
  --accent: #58a6ff;
  --green: #3fb950;
  --yellow: #d29922;
  --red: #f85149;
  --radius: 8px;
  --font: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
  --mono: 'SF Mono', 'Cascadia Code', 'Fira Code', monospace;
}

* { margin: 0; padding: 0; box-sizing: border-box; }
body { background: var(--bg); color: var(--text); font-family: var(--font); font-size: 14px; line-height: 1.5; }
.app { max-width: 1200px; margin: 0 auto; padding: 24px; }

header {
  display: flex; align-items: center; justify-content: space-between;
  margin-bottom: 24px; padding-bottom: 16px; border-bottom: 1px solid var(--border);
}
header h1 { font-size: 24px; font-weight: 600; }
header h1 .logo { color: var(--accent); font-family: var(--mono); font-weight: 700; }
header .subtitle { color: var(--text-muted); font-size: 13px; }

.health-badges { display: flex; gap: 8px; }
.badge {
  padding: 4px 10px; border-radius: 12px; font-size: 12px; font-weight: 500;
  background: var(--surface); border: 1px solid var(--border);
}
.badge.ok { border-color: var(--green); color: var(--green); }
.badge.warn { border-color: var(--yellow); color: var(--yellow); }

nav {
  display: flex; gap: 4px; margin-bottom: 24px; background: var(--surface);
  border-radius: var(--radius); padding: 4px; border: 1px solid var(--border);
}
nav button {
  flex: 1; padding: 8px 16px; border: none; border-radius: 6px; background: transparent;
  color: var(--text-muted); font-size: 13px; font-weight: 500; cursor: pointer;
}
nav button.active { background: var(--accent); color: #fff; }

.panel { display: none; }
.panel.active { display: block; }

.card {
  background: var(--surface); border: 1px solid var(--border);
  border-radius: var(--radius); padding: 20px; margin-bottom: 16px;
}
.card h2 { font-size: 16px; font-weight: 600; margin-bottom: 16px; }

.stats-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(170px, 1fr)); gap: 16px; margin-bottom: 24px; }
.stat-card {
  background: var(--surface); border: 1px solid var(--border);
  border-radius: var(--radius); padding: 16px; text-align: center;
}
.stat-card .value { font-size: 28px; font-weight: 700; font-family: var(--mono); line-height: 1.1; }
.stat-card .label { font-size: 12px; color: var(--text-muted); margin-top: 6px; text-transform: uppercase; letter-spacing: 0.5px; }

.tier-efficient { color: var(--green); }
.tier-moderate { color: var(--yellow); }
.tier-waste { color: var(--red); }

.score-ring { font-size: 56px; font-weight: 700; font-family: var(--mono); }

table { width: 100%; border-collapse: collapse; font-size: 13px; }
th, td { text-align: left; padding: 8px 12px; border-bottom: 1px solid var(--border); }
th { color: var(--text-muted); font-weight: 500; font-size: 12px; text-transform: uppercase; }
td.num, th.num { text-align: right; font-family: var(--mono); }

textarea, input[type=text] {
  width: 100%; background: var(--bg); color: var(--text); border: 1px solid var(--border);
  border-radius: 6px; padding: 8px; font-family: var(--font); font-size: 13px;
}
select, button.action {
  background: var(--accent); color: #fff; border: none; border-radius: 6px;
  padding: 8px 14px; margin-top: 8px; cursor: pointer; font-size: 13px;
}
select { background: var(--bg); border: 1px solid var(--border); color: var(--text); }
pre { font-family: var(--mono); font-size: 12px; white-space: pre-wrap; color: var(--text-muted); }

.chat-log { max-height: 320px; overflow-y: auto; margin-bottom: 12px; }
.chat-log .msg { padding: 6px 10px; margin-bottom: 6px; border-radius: 6px; }
.chat-log .user { background: rgba(88,166,255,0.12); }
.chat-log .assistant { background: rgba(63,185,80,0.10); }

.toast {
  position: fixed; bottom: 24px; right: 24px; padding: 10px 16px; border-radius: 6px;
  background: var(--green); color: #fff; opacity: 0; transition: opacity 0.2s;
}
.toast.show { opacity: 1; }
.toast.error { background: var(--red); }
</style>
</head>
<body>
<div class="app">

  <header>
    <div>
      <h1><span class="logo">wastemeter</span> Dashboard</h1>
      <div class="subtitle">AI usage efficiency: redundancy, reuse, refinement, excess, latency, abandonment</div>
    </div>
    <div class="health-badges" id="health-badges"></div>
  </header>

  <nav id="nav">
    <button class="active" data-panel="metrics">Efficiency</button>
    <button data-panel="sustainability">Sustainability</button>
    <button data-panel="analysis">Prompt Analysis</button>
    <button data-panel="chat">Assistant</button>
  </nav>

  <!-- Efficiency Panel -->
  <div class="panel active" id="panel-metrics">
    <div class="card" style="text-align:center">
      <h2>Overall Efficiency</h2>
      <div class="score-ring" id="score-value">&mdash;</div>
      <div id="score-level" style="color:var(--text-muted)"></div>
    </div>
    <div class="stats-grid" id="metric-cards"></div>
    <div class="card">
      <h2>Recent Redundant Prompts</h2>
      <table>
        <thead><tr><th>Prompt</th><th>Similar to</th><th class="num">Similarity</th></tr></thead>
        <tbody id="redundancy-tbody"></tbody>
      </table>
    </div>
    <div class="card">
      <h2>Refinement Topics</h2>
      <table>
        <thead><tr><th>Topic</th><th class="num">Prompts</th><th class="num">Loops</th><th>Tier</th></tr></thead>
        <tbody id="refinement-tbody"></tbody>
      </table>
    </div>
  </div>

  <!-- Sustainability Panel -->
  <div class="panel" id="panel-sustainability">
    <div class="stats-grid" id="sustainability-cards"></div>
    <div class="card">
      <h2>Top Initiatives by Impact</h2>
      <table>
        <thead><tr><th>Area</th><th>Description</th><th class="num">Impact</th><th class="num">CO2 t</th></tr></thead>
        <tbody id="initiatives-tbody"></tbody>
      </table>
    </div>
  </div>

  <!-- Analysis Panel -->
  <div class="panel" id="panel-analysis">
    <div class="card">
      <h2>Analyze a Prompt</h2>
      <textarea id="analysis-prompt" rows="5" placeholder="Paste a prompt..."></textarea>
      <select id="analysis-type">
        <option value="general">General</option>
        <option value="redundancy">Redundancy</option>
        <option value="complexity">Complexity</option>
        <option value="clarity">Clarity</option>
        <option value="efficiency">Efficiency</option>
      </select>
      <button class="action" id="analysis-run">Analyze</button>
      <pre id="analysis-result"></pre>
    </div>
  </div>

  <!-- Chat Panel -->
  <div class="panel" id="panel-chat">
    <div class="card">
      <h2>Sustainability Assistant</h2>
      <div class="chat-log" id="chat-log"></div>
      <input type="text" id="chat-input" placeholder="Ask about efficient AI usage...">
      <button class="action" id="chat-send">Send</button>
    </div>
  </div>

  <div class="toast" id="toast"></div>
</div>

<script>
let currentPanel = 'metrics';
let chatHistory = [];

async function api(method, path, body) {
  const opts = { method, headers: {} };
  if (body) {
    opts.headers['Content-Type'] = 'application/json';
    opts.body = JSON.stringify(body);
  }
  const res = await fetch(path, opts);
  const data = await res.json();
  if (!res.ok) throw new Error(data.error || res.statusText);
  return data;
}

function toast(msg, isError) {
  const el = document.getElementById('toast');
  el.textContent = msg;
  el.className = 'toast show' + (isError ? ' error' : '');
  setTimeout(() => el.className = 'toast', 3000);
}

function esc(s) {
  if (s === undefined || s === null) return '';
  return String(s).replace(/&/g,'&amp;').replace(/</g,'&lt;').replace(/>/g,'&gt;').replace(/"/g,'&quot;');
}

function pct(n) { return (n * 100).toFixed(1) + '%'; }

document.getElementById('nav').addEventListener('click', e => {
  if (e.target.tagName !== 'BUTTON') return;
  const panel = e.target.dataset.panel;
  document.querySelectorAll('nav button').forEach(b => b.classList.remove('active'));
  e.target.classList.add('active');
  document.querySelectorAll('.panel').forEach(p => p.classList.remove('active'));
  document.getElementById('panel-' + panel).classList.add('active');
  currentPanel = panel;
  if (panel === 'sustainability') loadSustainability();
});

// Efficiency
function card(label, value, tier) {
  return `<div class="stat-card"><div class="value tier-${tier}">${value}</div><div class="label">${label}</div></div>`;
}

async function loadMetrics() {
  try {
    const s = await api('GET', '/api/metrics');
    const m = s.metrics;
    document.getElementById('score-value').textContent = pct(s.efficiency.score);
    document.getElementById('score-level').textContent = s.efficiency.level;
    document.getElementById('metric-cards').innerHTML = [
      card('Redundancy', pct(m.redundancyRate), s.redundancyAnalysis.tier),
      card('Output Reuse', pct(m.reuseRate), s.outputReuseAnalysis.tier),
      card('Refinement Loops', m.averageRefinementLoops.toFixed(1), s.refinementAnalysis.tier),
      card('Excess Ratio', m.averageExcessRatio.toFixed(2) + 'x', s.excessAnalysis.tier),
      card('Latency / Token', m.averageLatencyPerToken.toFixed(1) + 'ms', s.latencyAnalysis.tier),
      card('Abandonment', pct(m.abandonmentRate), s.abandonmentAnalysis.tier),
    ].join('');
    document.getElementById('redundancy-tbody').innerHTML = s.redundancyAnalysis.recentSimilarities
      .map(p => `<tr><td>${esc(p.text)}</td><td>${esc(p.similarTo)}</td><td class="num">${pct(p.similarity)}</td></tr>`)
      .join('');
    document.getElementById('refinement-tbody').innerHTML = s.refinementAnalysis.recentRefinements
      .map(t => `<tr><td>${esc(t.topic)}</td><td class="num">${t.prompts}</td><td class="num">${t.loopCount}</td><td class="tier-${t.tier}">${t.tier}</td></tr>`)
      .join('');
  } catch (e) {
    toast('Failed to load metrics: ' + e.message, true);
  }
}

// Sustainability
async function loadSustainability() {
  try {
    const data = await api('GET', '/api/sustainability');
    const a = data.aggregates;
    document.getElementById('sustainability-cards').innerHTML = [
      card('Initiatives', a.aiQueries, 'efficient'),
      card('CO2 Saved (kg)', a.co2Kg.toLocaleString(), 'efficient'),
      card('Energy (kWh)', a.energyKWh.toLocaleString(), 'efficient'),
      card('Water (L)', a.waterL.toLocaleString(), 'efficient'),
      card('Avg Adoption', a.adoptionAvg + '%', 'moderate'),
    ].join('');
    const report = await api('GET', '/api/sustainability/report');
    document.getElementById('initiatives-tbody').innerHTML = report.topInitiatives
      .map(i => `<tr><td>${esc(i.area)}</td><td>${esc(i.description)}</td><td class="num">${i.impactScore}</td><td class="num">${i.carbonReduction}</td></tr>`)
      .join('');
  } catch (e) {
    toast(e.message, true);
  }
}

// Analysis
document.getElementById('analysis-run').addEventListener('click', async () => {
  const prompt = document.getElementById('analysis-prompt').value;
  const analysisType = document.getElementById('analysis-type').value;
  const out = document.getElementById('analysis-result');
  out.textContent = 'Analyzing...';
  try {
    const data = await api('POST', '/api/analysis', { prompt, analysisType });
    out.textContent = JSON.stringify(data.analysis, null, 2);
  } catch (e) {
    out.textContent = '';
    toast(e.message, true);
  }
});

// Chat
function renderChat() {
  document.getElementById('chat-log').innerHTML = chatHistory
    .map(m => `<div class="msg ${m.role}">${esc(m.content)}</div>`)
    .join('');
}

document.getElementById('chat-send').addEventListener('click', async () => {
  const input = document.getElementById('chat-input');
  const message = input.value.trim();
  if (!message) return;
  input.value = '';
  const history = chatHistory.slice();
  chatHistory.push({ role: 'user', content: message });
  renderChat();
  try {
    const data = await api('POST', '/api/chat', { message, conversationHistory: history });
    chatHistory.push({ role: 'assistant', content: data.response });
    renderChat();
  } catch (e) {
    toast(e.message, true);
  }
});

// Health badges
async function loadHealth() {
  try {
    const h = await api('GET', '/api/health');
    document.getElementById('health-badges').innerHTML = [
      badge('Dataset', h.datasetAvailable),
      badge('Analysis key', h.analysisKeySet),
      badge('Chat key', h.chatKeySet),
    ].join('');
  } catch (e) {
    // Badges are decorative
  }
}

function badge(label, ok) {
  return `<span class="badge ${ok ? 'ok' : 'warn'}">${esc(label)}</span>`;
}

loadHealth();
loadMetrics();
setInterval(() => { if (currentPanel === 'metrics') loadMetrics(); }, 3000);
</script>
</body>
</html>"##;
