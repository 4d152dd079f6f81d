// gradient.rs - Integer image gradients via central differences.
//
// Masks:
//   dx = [0 0 0; -1 0 1; 0 0 0]
//   dy = [0 -1 0; 0 0 0; 0 1 0]
//
// i.e. dx(x, y) = I(x+1, y) - I(x-1, y). The result is twice the
// derivative; nothing downstream divides it out, and the tracker's step
// scaling absorbs the factor.
//
// BORDER HANDLING: clamp (replicate edge pixels). At x = 0 the missing
// left neighbour is I(0, y), so dx(0, y) = I(1, y) - I(0, y). The plane is
// never read out of bounds.
//
// Two flavours exist:
//   - over a luma plane (corner scoring, agent sensing)
//   - inside a padded i32 patch (tracking), where the one-pixel pad ring
//     supplies the neighbours and no clamping is needed.

use crate::error::FlowResult;
use crate::image::{Image, Pixel};

/// Gradient (dx, dy) of the plane at (x, y) with edge replication.
///
/// Coordinates outside the plane are clamped first, so any (x, y) is
/// accepted.
#[inline]
pub fn gradient_at<T: Pixel>(img: &Image<T>, x: i32, y: i32) -> (i32, i32) {
    let dx = img.get_clamped(x + 1, y).to_i32() - img.get_clamped(x - 1, y).to_i32();
    let dy = img.get_clamped(x, y + 1).to_i32() - img.get_clamped(x, y - 1).to_i32();
    (dx, dy)
}

/// Fill `dx` and `dy` with the gradients of every pixel of `src`.
///
/// # Panics
/// Panics if the output planes do not match `src` in size.
pub fn gradients_into<T: Pixel>(src: &Image<T>, dx: &mut Image<i32>, dy: &mut Image<i32>) {
    assert_eq!(src.dims(), dx.dims(), "dx plane size mismatch");
    assert_eq!(src.dims(), dy.dims(), "dy plane size mismatch");

    let w = src.width();
    let h = src.height();
    if w == 0 || h == 0 {
        return;
    }

    let s = src.as_slice();
    let dxs = dx.as_mut_slice();
    for y in 0..h {
        let row = &s[y * w..(y + 1) * w];
        let out = &mut dxs[y * w..(y + 1) * w];
        for x in 0..w {
            let l = row[x.saturating_sub(1)].to_i32();
            let r = row[(x + 1).min(w - 1)].to_i32();
            out[x] = r - l;
        }
    }

    let dys = dy.as_mut_slice();
    for y in 0..h {
        let up = &s[y.saturating_sub(1) * w..][..w];
        let down = &s[(y + 1).min(h - 1) * w..][..w];
        let out = &mut dys[y * w..(y + 1) * w];
        for x in 0..w {
            out[x] = down[x].to_i32() - up[x].to_i32();
        }
    }
}

/// Allocate and compute both gradient planes of `src`.
pub fn gradients<T: Pixel>(src: &Image<T>) -> FlowResult<(Image<i32>, Image<i32>)> {
    let mut dx = Image::try_new(src.dims(), "dx plane")?;
    let mut dy = Image::try_new(src.dims(), "dy plane")?;
    gradients_into(src, &mut dx, &mut dy);
    Ok((dx, dy))
}

/// Central-difference gradients of the inner part of a padded patch.
///
/// `padded` is a row-major square of side `2 * (half_window + 1) + 1`;
/// `dx` and `dy` receive the row-major inner square of side
/// `2 * half_window + 1`. Each inner pixel reads its four neighbours from
/// the padded patch.
///
/// # Panics
/// Panics if any slice has the wrong length.
pub fn patch_gradients(padded: &[i32], half_window: usize, dx: &mut [i32], dy: &mut [i32]) {
    let size = 2 * half_window + 1;
    let padded_size = size + 2;
    assert_eq!(padded.len(), padded_size * padded_size, "padded patch size mismatch");
    assert_eq!(dx.len(), size * size, "dx patch size mismatch");
    assert_eq!(dy.len(), size * size, "dy patch size mismatch");

    for y in 1..padded_size - 1 {
        for x in 1..padded_size - 1 {
            let out = (y - 1) * size + (x - 1);
            dx[out] = padded[y * padded_size + x + 1] - padded[y * padded_size + x - 1];
            dy[out] = padded[(y + 1) * padded_size + x] - padded[(y - 1) * padded_size + x];
        }
    }
}

/// Copy the inner `2 * half_window + 1` square out of a padded patch.
pub fn patch_interior(padded: &[i32], half_window: usize, out: &mut [i32]) {
    let size = 2 * half_window + 1;
    let padded_size = size + 2;
    assert_eq!(padded.len(), padded_size * padded_size, "padded patch size mismatch");
    assert_eq!(out.len(), size * size, "interior patch size mismatch");

    for y in 0..size {
        let src = &padded[(y + 1) * padded_size + 1..][..size];
        out[y * size..(y + 1) * size].copy_from_slice(src);
    }
}
