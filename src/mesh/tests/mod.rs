mod test_bowyer_watson_basic;
mod test_mesher_basic;
mod test_thin_zone_basic;
