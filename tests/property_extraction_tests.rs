use chart_extract::api::RawPixelSeries;
use chart_extract::core::{Frequency, PixelPoint, TimeIndex, find_zero_crossing};
use chrono::{Days, NaiveDate, Weekday};
use proptest::prelude::*;

fn frequency_strategy() -> impl Strategy<Value = Frequency> {
    prop_oneof![
        Just(Frequency::Daily),
        Just(Frequency::Weekly(Weekday::Sun)),
        Just(Frequency::Weekly(Weekday::Wed)),
        Just(Frequency::MonthStart),
        Just(Frequency::QuarterStart),
        Just(Frequency::YearStart),
    ]
}

fn date_from(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 1)
        .and_then(|base| base.checked_add_days(Days::new(offset)))
        .expect("date in range")
}

proptest! {
    #[test]
    fn raw_series_x_is_strictly_increasing(
        points in prop::collection::vec((-1_000.0f64..1_000.0, -1_000.0f64..1_000.0), 1..200)
    ) {
        let screen: Vec<PixelPoint> = points.iter().map(|(x, y)| PixelPoint::new(*x, *y)).collect();
        let series = RawPixelSeries::from_screen_points(screen, 1_000.0, 1).expect("series");
        let xs = series.xs();
        prop_assert!(xs.windows(2).all(|pair| pair[0] < pair[1]));
        prop_assert!(series.upward_ys().iter().all(|y| *y >= 0.0));
    }

    #[test]
    fn calendar_index_is_strictly_increasing(
        start in 0u64..12_000,
        span in 0u64..4_000,
        frequency in frequency_strategy()
    ) {
        let start_date = date_from(start);
        let end_date = date_from(start + span);
        let index = TimeIndex::calendar(start_date, end_date, frequency).expect("index");
        prop_assert!(!index.is_empty());
        prop_assert!(index.dates().windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn aligned_values_match_index_length(
        span in 30u64..3_000,
        values in prop::collection::vec(-1e6f64..1e6, 1..400)
    ) {
        let index = TimeIndex::calendar(date_from(0), date_from(span), Frequency::Weekly(Weekday::Mon))
            .expect("index");
        let alignment = index.align(&values).expect("align");
        prop_assert_eq!(alignment.values.len(), index.len());
        prop_assert!(alignment.filled_points < index.len());
        prop_assert!(alignment.values.iter().all(|value| value.is_finite()));
    }

    #[test]
    fn single_zero_crossing_lies_between_bracketing_pixels(
        start in -500.0f64..500.0,
        steps in prop::collection::vec(0.5f64..20.0, 2..60),
        slope in 0.01f64..10.0,
        cross_at in 0.05f64..0.95
    ) {
        let mut pixels = vec![start];
        for step in &steps {
            let last = pixels[pixels.len() - 1];
            pixels.push(last + step);
        }
        let first = pixels[0];
        let last = pixels[pixels.len() - 1];
        let zero_px = first + (last - first) * cross_at;
        let values: Vec<f64> = pixels.iter().map(|px| (px - zero_px) * slope).collect();
        prop_assume!(values.iter().all(|value| *value != 0.0));

        let crossing = find_zero_crossing(&pixels, &values).expect("crossing");
        let upper = pixels.partition_point(|px| *px < zero_px);
        prop_assert!(upper > 0 && upper < pixels.len());
        prop_assert!(crossing > pixels[upper - 1] && crossing < pixels[upper]);
        prop_assert!((crossing - zero_px).abs() <= 1e-6 * (1.0 + zero_px.abs()));
        let value_at_crossing = (crossing - zero_px) * slope;
        prop_assert!(value_at_crossing.abs() <= 1e-6 * (1.0 + slope * (last - first)));
    }
}
