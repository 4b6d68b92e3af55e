//! In-page agent scripts
//!
//! [`AGENT_SCRIPT`] installs `window.__pinshot`, the page half of
//! [`CdpAgent`](super::CdpAgent). Everything it renders lives in a shadow
//! root so page styles do not leak in. User input is reported through the
//! `pinshotEvent` runtime binding as JSON-encoded [`UiEvent`](crate::UiEvent)s.

/// Name of the runtime binding events are reported through
pub const EVENT_BINDING: &str = "pinshotEvent";

/// Installs `window.__pinshot`; a no-op when already present
pub const AGENT_SCRIPT: &str = r#"
(() => {
  if (window.__pinshot) return true;

  const Z = 2147483647;
  const emit = (event) => {
    if (typeof window.pinshotEvent === 'function') {
      window.pinshotEvent(JSON.stringify(event));
    }
  };

  const host = document.createElement('pinshot-root');
  host.style.cssText = 'all: initial; position: fixed; inset: 0; pointer-events: none; z-index: ' + Z;
  const root = host.attachShadow({ mode: 'open' });
  const attach = () => {
    if (!host.isConnected) document.documentElement.appendChild(host);
  };

  const refs = [];
  const surfaces = new Map();
  let selection = null;
  let widget = null;
  let tracking = false;

  const onMove = (e) => {
    if (selection || tracking) emit({ type: 'pointerMove', x: Math.round(e.clientX), y: Math.round(e.clientY) });
  };
  const onUp = (e) => {
    if (selection || tracking) emit({ type: 'pointerUp', x: Math.round(e.clientX), y: Math.round(e.clientY) });
    tracking = false;
  };
  const onKey = (e) => {
    if (selection && e.key === 'Escape') {
      e.preventDefault();
      emit({ type: 'escape' });
    }
  };
  document.addEventListener('mousemove', onMove, true);
  document.addEventListener('mouseup', onUp, true);
  document.addEventListener('keydown', onKey, true);

  const api = {
    dimensions() {
      const doc = document.documentElement;
      const body = document.body || doc;
      return {
        viewportWidth: window.innerWidth,
        viewportHeight: window.innerHeight,
        totalWidth: Math.max(doc.scrollWidth, body.scrollWidth),
        totalHeight: Math.max(doc.scrollHeight, body.scrollHeight),
        devicePixelRatio: window.devicePixelRatio || 1,
      };
    },

    scrollOffset() {
      return Math.max(0, Math.round(window.scrollY));
    },

    scrollTo(y) {
      window.scrollTo(0, y);
      return Math.max(0, Math.round(window.scrollY));
    },

    overflow() {
      return {
        root: document.documentElement.style.overflow,
        body: document.body ? document.body.style.overflow : '',
      };
    },

    setOverflow(o) {
      document.documentElement.style.overflow = o.root;
      if (document.body) document.body.style.overflow = o.body;
      return true;
    },

    positioned() {
      const found = [];
      for (const el of document.querySelectorAll('body *')) {
        if (el === host) continue;
        const position = getComputedStyle(el).position;
        if (position !== 'fixed' && position !== 'sticky') continue;
        refs.push(el);
        found.push({
          element: refs.length - 1,
          computedPosition: position,
          tag: el.tagName,
          classes: Array.from(el.classList),
          inline: { position: el.style.position, display: el.style.display },
        });
      }
      return found;
    },

    setStyle(id, style) {
      const el = refs[id];
      if (!el) throw new Error('unknown element ' + id);
      el.style.position = style.position;
      el.style.display = style.display;
      return true;
    },

    release() {
      refs.length = 0;
      return true;
    },

    showSelection() {
      api.removeSelection();
      attach();
      const layer = document.createElement('div');
      layer.style.cssText =
        'position: fixed; inset: 0; cursor: crosshair; pointer-events: auto; background: rgba(0,0,0,0.15)';
      const box = document.createElement('div');
      box.style.cssText =
        'position: fixed; display: none; border: 2px dashed #1a73e8; background: rgba(26,115,232,0.12)';
      layer.appendChild(box);
      layer.addEventListener('mousedown', (e) => {
        if (e.button !== 0) return;
        e.preventDefault();
        emit({ type: 'pointerDown', x: Math.round(e.clientX), y: Math.round(e.clientY) });
      });
      root.appendChild(layer);
      selection = { layer, box };
      return true;
    },

    drawSelection(r) {
      if (!selection) return false;
      const s = selection.box.style;
      s.display = 'block';
      s.left = r.left + 'px';
      s.top = r.top + 'px';
      s.width = r.width + 'px';
      s.height = r.height + 'px';
      return true;
    },

    removeSelection() {
      if (selection) selection.layer.remove();
      selection = null;
      return true;
    },

    mount(src, rect, config) {
      api.unmount();
      attach();
      const frame = document.createElement('div');
      frame.style.cssText =
        'position: fixed; display: flex; flex-direction: column; pointer-events: auto;' +
        'background: #fff; box-shadow: 0 4px 16px rgba(0,0,0,0.35); border-radius: 4px; overflow: hidden';

      const header = document.createElement('div');
      header.style.cssText =
        'display: flex; align-items: center; gap: 4px; padding: 0 6px; background: #202124;' +
        'color: #fff; font: 12px sans-serif; user-select: none; flex: none;' +
        'height: ' + config.header_height + 'px; cursor: ' + (config.draggable ? 'move' : 'default');
      const buttons = [['save', 'Save'], ['copy', 'Copy'], ['retake', 'Retake']];
      if (config.pip) buttons.push(['togglePip', 'PiP']);
      buttons.push(['close', '×']);
      const spacer = document.createElement('span');
      spacer.style.flex = '1';
      header.appendChild(spacer);
      for (const [action, label] of buttons) {
        const b = document.createElement('button');
        b.textContent = label;
        b.style.cssText = 'font: 12px sans-serif; cursor: pointer';
        b.addEventListener('mousedown', (e) => e.stopPropagation());
        b.addEventListener('click', (e) => {
          e.stopPropagation();
          emit({ type: 'action', action });
        });
        header.appendChild(b);
      }
      if (config.draggable) {
        header.addEventListener('mousedown', (e) => {
          if (e.button !== 0) return;
          e.preventDefault();
          tracking = true;
          emit({ type: 'headerDown', x: Math.round(e.clientX), y: Math.round(e.clientY) });
        });
      }
      header.addEventListener('dblclick', () => emit({ type: 'headerDoubleClick' }));

      const img = document.createElement('img');
      img.src = src;
      img.draggable = false;
      img.style.cssText = 'flex: 1; min-height: 0; width: 100%; object-fit: contain';

      frame.appendChild(header);
      frame.appendChild(img);

      if (config.resizable) {
        const handle = document.createElement('div');
        handle.style.cssText =
          'position: absolute; right: 0; bottom: 0; width: 14px; height: 14px; cursor: nwse-resize;' +
          'background: linear-gradient(135deg, transparent 50%, #5f6368 50%)';
        handle.addEventListener('mousedown', (e) => {
          if (e.button !== 0) return;
          e.preventDefault();
          e.stopPropagation();
          tracking = true;
          emit({ type: 'resizeDown', x: Math.round(e.clientX), y: Math.round(e.clientY) });
        });
        frame.appendChild(handle);
      }

      const toast = document.createElement('div');
      toast.style.cssText =
        'position: absolute; left: 50%; bottom: 8px; transform: translateX(-50%); padding: 4px 8px;' +
        'background: rgba(32,33,36,0.9); color: #fff; font: 12px sans-serif; border-radius: 3px;' +
        'display: none; pointer-events: none';
      frame.appendChild(toast);

      root.appendChild(frame);
      widget = { frame, toast, timer: null };
      api.update(rect);
      return true;
    },

    update(r) {
      if (!widget) return false;
      const s = widget.frame.style;
      s.left = r.left + 'px';
      s.top = r.top + 'px';
      s.width = r.width + 'px';
      s.height = r.height + 'px';
      return true;
    },

    unmount() {
      if (widget) {
        clearTimeout(widget.timer);
        widget.frame.remove();
      }
      widget = null;
      tracking = false;
      return true;
    },

    toast(message) {
      if (!widget) return false;
      const t = widget.toast;
      t.textContent = message;
      t.style.display = 'block';
      clearTimeout(widget.timer);
      widget.timer = setTimeout(() => { t.style.display = 'none'; }, 2000);
      return true;
    },

    async clipboard(src) {
      const blob = await (await fetch(src)).blob();
      await navigator.clipboard.write([new ClipboardItem({ [blob.type]: blob })]);
      return true;
    },

    async createLive(id, src) {
      const img = new Image();
      img.src = src;
      await img.decode();
      const canvas = document.createElement('canvas');
      canvas.width = img.naturalWidth;
      canvas.height = img.naturalHeight;
      const ctx = canvas.getContext('2d');
      const stream = canvas.captureStream();
      const video = document.createElement('video');
      video.muted = true;
      video.playsInline = true;
      video.style.cssText = 'position: fixed; width: 1px; height: 1px; opacity: 0; pointer-events: none';
      video.srcObject = stream;
      root.appendChild(video);
      const surface = { canvas, stream, video, frame: 0 };
      const draw = () => {
        ctx.drawImage(img, 0, 0);
        surface.frame = requestAnimationFrame(draw);
      };
      draw();
      await video.play();
      video.addEventListener('leavepictureinpicture', () => emit({ type: 'pipExited' }));
      surfaces.set(id, surface);
      return true;
    },

    async enterPip(id) {
      const surface = surfaces.get(id);
      if (!surface) throw new Error('unknown live surface ' + id);
      if (!document.pictureInPictureEnabled) throw new Error('picture-in-picture is disabled');
      await surface.video.requestPictureInPicture();
      return true;
    },

    async exitPip(id) {
      const surface = surfaces.get(id);
      if (surface && document.pictureInPictureElement === surface.video) {
        await document.exitPictureInPicture();
      }
      return true;
    },

    releaseLive(id) {
      const surface = surfaces.get(id);
      if (!surface) return false;
      cancelAnimationFrame(surface.frame);
      surface.stream.getTracks().forEach((t) => t.stop());
      surface.video.srcObject = null;
      surface.video.remove();
      surfaces.delete(id);
      return true;
    },
  };

  window.__pinshot = api;
  return true;
})()
"#;

/// `window.__pinshot.<method>(<args>)`, with each argument JSON-encoded
pub fn call(method: &str, args: &[serde_json::Value]) -> String {
    let args = args
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("window.__pinshot.{}({})", method, args)
}
