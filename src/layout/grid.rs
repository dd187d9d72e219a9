/// Smallest row height ever returned.
pub const MIN_ROW_HEIGHT: f32 = 1.0;

/// Column count and row height chosen for the picker grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub columns: usize,
    pub row_height: f32,
}

/// Computes the grid that gives each tile the largest area.
///
/// # Algorithm
/// 1. Try every column count from 1 to `count`.
/// 2. Subtract the gaps from the container, split the rest into cells.
/// 3. Fit an `aspect` (width / height) tile into each cell.
/// 4. Keep the candidate with the largest tile area.
///
/// When no candidate has a positive area the grid falls back to one column
/// with the height split evenly, never below [`MIN_ROW_HEIGHT`].
pub fn best_layout(count: usize, width: f32, height: f32, aspect: f32, gap: f32) -> GridLayout {
    let count = count.max(1);
    let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
    let gap = gap.max(0.0);

    let mut best: Option<(f32, GridLayout)> = None;
    for columns in 1..=count {
        let rows = count.div_ceil(columns);
        let avail_w = width - gap * (columns - 1) as f32;
        let avail_h = height - gap * (rows - 1) as f32;
        if avail_w <= 0.0 || avail_h <= 0.0 {
            continue;
        }

        let cell_w = avail_w / columns as f32;
        let cell_h = avail_h / rows as f32;
        let (tile_w, tile_h) = if cell_w / aspect <= cell_h {
            (cell_w, cell_w / aspect)
        } else {
            (cell_h * aspect, cell_h)
        };

        let area = tile_w * tile_h;
        if area > 0.0 && best.map_or(true, |(best_area, _)| area > best_area) {
            best = Some((
                area,
                GridLayout {
                    columns,
                    row_height: tile_h,
                },
            ));
        }
    }

    match best {
        Some((_, layout)) => layout,
        None => {
            let split = (height - gap * (count - 1) as f32) / count as f32;
            GridLayout {
                columns: 1,
                row_height: split.max(MIN_ROW_HEIGHT),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_item_fills_bounded_axis() {
        // Height-bound: 16:9 tile in a square container.
        let layout = best_layout(1, 1600.0, 1600.0, 16.0 / 9.0, 8.0);
        assert_eq!(layout.columns, 1);
        assert!((layout.row_height - 900.0).abs() < 0.01);

        // Width-bound: tall container keeps the full height available.
        let layout = best_layout(1, 1000.0, 300.0, 1.0, 0.0);
        assert_eq!(layout.columns, 1);
        assert!((layout.row_height - 300.0).abs() < 0.01);
    }

    #[test]
    fn test_square_grid_for_square_tiles() {
        let layout = best_layout(4, 400.0, 400.0, 1.0, 0.0);
        assert_eq!(layout.columns, 2);
        assert!((layout.row_height - 200.0).abs() < 0.01);
    }

    #[test]
    fn test_wide_container_prefers_columns() {
        let layout = best_layout(6, 1200.0, 200.0, 1.0, 0.0);
        assert_eq!(layout.columns, 6);
        assert!((layout.row_height - 200.0).abs() < 0.01);
    }

    #[test]
    fn test_gaps_are_subtracted() {
        let layout = best_layout(2, 210.0, 100.0, 1.0, 10.0);
        assert_eq!(layout.columns, 2);
        assert!((layout.row_height - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_many_items_in_small_container() {
        let width = 50.0;
        let layout = best_layout(500, width, 40.0, 1.0, 4.0);
        assert!(layout.columns >= 1);
        assert!(layout.row_height >= MIN_ROW_HEIGHT);
        // Every column needs at least a gap's worth of room.
        assert!(layout.columns as f32 <= width / 4.0 + 1.0);
    }

    #[test]
    fn test_degenerate_container_falls_back() {
        let layout = best_layout(3, 0.0, 0.0, 1.0, 10.0);
        assert_eq!(layout.columns, 1);
        assert_eq!(layout.row_height, MIN_ROW_HEIGHT);

        let layout = best_layout(0, -5.0, 90.0, f32::NAN, 0.0);
        assert_eq!(layout.columns, 1);
        assert!((layout.row_height - 90.0).abs() < 0.01);
    }
}
