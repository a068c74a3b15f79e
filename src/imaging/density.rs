//! Pixel density sniffing for JPEG (JFIF APP0) and PNG (pHYs).
//!
//! The `image` crate decodes pixels but drops the physical resolution, so
//! the header is walked here directly. Only the two containers that carry
//! a density we can write back out are inspected; anything else yields
//! `None` and the output gets the encoder's default density.

/// Horizontal and vertical resolution in dots per inch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub x_dpi: u16,
    pub y_dpi: u16,
}

/// Read the declared resolution from encoded bytes, if any.
pub fn read_resolution(data: &[u8]) -> Option<Resolution> {
    if data.starts_with(&[0xFF, 0xD8]) {
        read_jfif_density(data)
    } else if data.starts_with(PNG_SIGNATURE) {
        read_png_phys(data)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// JPEG: JFIF APP0
// ---------------------------------------------------------------------------

const JFIF_IDENT: &[u8] = b"JFIF\0";

/// Walk marker segments until APP0/JFIF or start-of-scan.
///
/// APP0 payload: "JFIF\0" (5), version (2), units (1), Xdensity (2),
/// Ydensity (2). Units 1 = dots per inch, 2 = dots per cm, 0 = aspect
/// ratio only (no physical size).
fn read_jfif_density(data: &[u8]) -> Option<Resolution> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        // Fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == 0xDA || marker == 0xD9 {
            return None;
        }
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }

        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if seg_len < 2 {
            return None;
        }
        let seg_start = pos + 4;
        let seg_end = (pos + 2 + seg_len).min(data.len());

        if marker == 0xE0 {
            let segment = &data[seg_start..seg_end];
            if segment.len() >= 12 && segment.starts_with(JFIF_IDENT) {
                let units = segment[7];
                let x = u16::from_be_bytes([segment[8], segment[9]]);
                let y = u16::from_be_bytes([segment[10], segment[11]]);
                return match units {
                    1 => Some(Resolution { x_dpi: x, y_dpi: y }),
                    2 => Some(Resolution {
                        x_dpi: per_cm_to_dpi(x as f64),
                        y_dpi: per_cm_to_dpi(y as f64),
                    }),
                    _ => None,
                };
            }
        }

        pos += 2 + seg_len;
    }
    None
}

fn per_cm_to_dpi(value: f64) -> u16 {
    (value * 2.54).round().clamp(0.0, u16::MAX as f64) as u16
}

// ---------------------------------------------------------------------------
// PNG: pHYs chunk
// ---------------------------------------------------------------------------

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Walk chunks until pHYs or IDAT.
///
/// Chunk layout: length (4, big-endian), type (4), data, CRC (4).
/// pHYs data: pixels per unit X (4), Y (4), unit (1; 1 = metre).
fn read_png_phys(data: &[u8]) -> Option<Resolution> {
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= data.len() {
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        let kind = &data[pos + 4..pos + 8];
        let body_start = pos + 8;
        let body_end = body_start.checked_add(len)?;
        if body_end > data.len() {
            return None;
        }

        match kind {
            b"pHYs" if len >= 9 => {
                let body = &data[body_start..body_end];
                if body[8] != 1 {
                    return None;
                }
                let x = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
                let y = u32::from_be_bytes([body[4], body[5], body[6], body[7]]);
                return Some(Resolution {
                    x_dpi: per_metre_to_dpi(x),
                    y_dpi: per_metre_to_dpi(y),
                });
            }
            b"IDAT" | b"IEND" => return None,
            _ => {}
        }

        pos = body_end + 4;
    }
    None
}

fn per_metre_to_dpi(value: u32) -> u16 {
    (value as f64 * 0.0254).round().clamp(0.0, u16::MAX as f64) as u16
}
