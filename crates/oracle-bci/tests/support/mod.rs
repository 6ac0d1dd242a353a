pub mod mock_sensor;
